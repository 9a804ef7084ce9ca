use janitor_docker::{ContainerManager, ContainerStatus, DockerError};

#[test]
fn test_container_manager_creation() {
    // Client construction is lazy; no daemon round-trip happens here.
    let manager = ContainerManager::new();
    assert!(manager.is_ok());
}

#[test]
fn test_container_status_conversion() {
    assert!(matches!(ContainerStatus::from("running"), ContainerStatus::Running));
    assert!(matches!(ContainerStatus::from("RUNNING"), ContainerStatus::Running));
    assert!(matches!(ContainerStatus::from("paused"), ContainerStatus::Paused));
    assert!(matches!(ContainerStatus::from("created"), ContainerStatus::Created));
    assert!(matches!(ContainerStatus::from("exited (0)"), ContainerStatus::Exited(0)));
    assert!(matches!(ContainerStatus::from("exited (1)"), ContainerStatus::Exited(1)));
    assert!(matches!(ContainerStatus::from("exited"), ContainerStatus::Exited(0)));
    assert!(matches!(ContainerStatus::from("unknown_status"), ContainerStatus::Unknown(_)));
}

#[test]
fn test_only_running_counts_as_running() {
    assert!(ContainerStatus::Running.is_running());
    for status in [
        ContainerStatus::Paused,
        ContainerStatus::Restarting,
        ContainerStatus::Dead,
        ContainerStatus::Created,
        ContainerStatus::Exited(0),
        ContainerStatus::NotFound,
    ] {
        assert!(!status.is_running(), "{} must not count as running", status);
    }
}

#[test]
fn test_container_status_display() {
    assert_eq!(format!("{}", ContainerStatus::Running), "running");
    assert_eq!(format!("{}", ContainerStatus::NotFound), "not_found");
    assert_eq!(format!("{}", ContainerStatus::Exited(0)), "exited(0)");
    assert_eq!(format!("{}", ContainerStatus::Exited(1)), "exited(1)");
    assert_eq!(format!("{}", ContainerStatus::Unknown("odd".to_string())), "unknown(odd)");
}

#[test]
fn test_exec_error_message() {
    let err = DockerError::ExecError {
        container: "mastodon-web".to_string(),
        message: "Failed to attach to exec".to_string(),
    };
    assert_eq!(err.to_string(), "Exec in container mastodon-web failed: Failed to attach to exec");
}
