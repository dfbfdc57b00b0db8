//! Test constants

pub const TEST_EXTENSION_NAME: &str = "yaba";
pub const TEST_EXTENSION_VERSION: &str = "1.0.0";

/// Settings file with public settings only
pub const PUBLIC_ONLY_SETTINGS: &str = r#"{"runtimeSettings":[{"handlerSettings":{"publicSettings":{"commandToExecute":"echo hi"},"protectedSettings":null,"protectedSettingsCertThumbprint":null}}]}"#;

/// Settings file with two runtime settings containers
pub const TWO_CONTAINER_SETTINGS: &str = r#"{"runtimeSettings":[{"handlerSettings":{"publicSettings":{}}},{"handlerSettings":{"publicSettings":{}}}]}"#;

/// Settings file with an encrypted protected section
pub const PROTECTED_SETTINGS: &str = r#"{"runtimeSettings":[{"handlerSettings":{"publicSettings":{"a":1},"protectedSettings":"c2VjcmV0","protectedSettingsCertThumbprint":"ABCDEF"}}]}"#;
