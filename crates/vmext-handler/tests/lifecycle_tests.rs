//! Extension lifecycle integration tests
//!
//! Tests the state machine end to end against a mock environment:
//! - Construction validation
//! - Enable skip rule and sequence number bookkeeping
//! - Disable marker handling
//! - Status reporting and exit codes on failure
//! - Built-in install/uninstall/resetstate/update behavior
//! - Command line parsing

mod common;

use common::*;
use std::cell::Cell;
use std::rc::Rc;
use vmext_handler::{InitializationInfo, Outcome, VmExtension};

fn enable_returning(message: &'static str) -> impl Fn(&VmExtension) -> anyhow::Result<String> {
    move |_| Ok(message.to_string())
}

fn counting_enable(counter: Rc<Cell<u32>>) -> impl Fn(&VmExtension) -> anyhow::Result<String> {
    move |_| {
        counter.set(counter.get() + 1);
        Ok(String::new())
    }
}

fn default_info(requires_seq_no_change: bool) -> InitializationInfo {
    InitializationInfo::new(
        TEST_EXTENSION_NAME,
        TEST_EXTENSION_VERSION,
        requires_seq_no_change,
        enable_returning(""),
    )
}

fn build(info: InitializationInfo, mock: &MockEnvironment) -> VmExtension {
    VmExtension::new_with(info, mock.boxed()).unwrap()
}

#[cfg(test)]
mod construction {
    use super::*;
    use vmext_core::Error;

    #[test]
    fn test_empty_name() {
        let env = TestHandlerEnv::new();
        let info = InitializationInfo::new("", "1.0", true, enable_returning(""));
        let result =
            VmExtension::new_with(info, MockEnvironment::new(env.handler_env.clone()).boxed());
        assert!(matches!(result, Err(Error::EmptyName)));
    }

    #[test]
    fn test_empty_version() {
        let env = TestHandlerEnv::new();
        let info = InitializationInfo::new("yaba", "", true, enable_returning(""));
        let result =
            VmExtension::new_with(info, MockEnvironment::new(env.handler_env.clone()).boxed());
        assert!(matches!(result, Err(Error::EmptyVersion)));
    }

    #[test]
    fn test_missing_enable_callback() {
        let env = TestHandlerEnv::new();
        let mut info = default_info(true);
        info.enable_callback = None;
        let result =
            VmExtension::new_with(info, MockEnvironment::new(env.handler_env.clone()).boxed());
        assert!(matches!(result, Err(Error::MissingEnableCallback)));
    }

    #[test]
    fn test_validation_precedes_environment_access() {
        // The broken sequence store is never consulted
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_unparsable_current();
        let info = InitializationInfo::new("", "1.0", true, enable_returning(""));

        let result = VmExtension::new_with(info, mock.boxed());
        assert!(matches!(result, Err(Error::EmptyName)));
    }

    #[test]
    fn test_unparsable_current_sequence_number_is_fatal() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_unparsable_current();

        let result = VmExtension::new_with(default_info(true), mock.boxed());
        assert!(matches!(result, Err(Error::InvalidSequenceNumber { .. })));
    }

    #[test]
    fn test_accessors() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_current(3)
            .with_requested(4);
        let ext = build(default_info(true), &mock);

        assert_eq!(ext.name(), TEST_EXTENSION_NAME);
        assert_eq!(ext.version(), TEST_EXTENSION_VERSION);
        assert_eq!(ext.handler_env(), &env.handler_env);
        assert_eq!(ext.current_sequence_number().map(|s| s.get()), Some(3));
        assert_eq!(ext.requested_sequence_number().unwrap().get(), 4);
    }
}

#[cfg(test)]
mod enable {
    use super::*;
    use anyhow::{anyhow, Context};
    use vmext_core::SequenceNumber;
    use vmext_handler::{ErrorWithClarification, OperationName, StatusType};

    #[test]
    fn test_same_sequence_number_is_skipped() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_current(5)
            .with_requested(5);
        let calls = Rc::new(Cell::new(0));
        let info = InitializationInfo::new(
            TEST_EXTENSION_NAME,
            TEST_EXTENSION_VERSION,
            true,
            counting_enable(calls.clone()),
        );
        let ext = build(info, &mock);

        let outcome = ext.dispatch(OperationName::Enable);

        assert!(matches!(outcome, Outcome::Skipped { .. }));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(calls.get(), 0);
        assert_status_folder_empty(env.status_folder());
        assert!(mock.sequence_writes().is_empty());
    }

    #[test]
    fn test_older_sequence_number_is_skipped() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_current(5)
            .with_requested(3);
        let calls = Rc::new(Cell::new(0));
        let info = InitializationInfo::new("yaba", "1.0", true, counting_enable(calls.clone()));
        let ext = build(info, &mock);

        assert!(matches!(ext.dispatch(OperationName::Enable), Outcome::Skipped { .. }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_newer_sequence_number_runs_once() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_current(4)
            .with_requested(5);
        let calls = Rc::new(Cell::new(0));
        let info = InitializationInfo::new("yaba", "1.0", true, counting_enable(calls.clone()));
        let ext = build(info, &mock);

        let outcome = ext.dispatch(OperationName::Enable);

        assert!(matches!(outcome, Outcome::Succeeded { .. }));
        assert_eq!(calls.get(), 1);
        assert_eq!(mock.sequence_writes(), vec![SequenceNumber::new(5)]);
        assert_status(env.status_folder(), 5, StatusType::Success, "Enable", "Enable succeeded");
    }

    #[test]
    fn test_first_run_always_proceeds() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(0);
        let calls = Rc::new(Cell::new(0));
        let info = InitializationInfo::new("yaba", "1.0", true, counting_enable(calls.clone()));
        let ext = build(info, &mock);

        assert!(ext.current_sequence_number().is_none());
        assert!(ext.dispatch(OperationName::Enable).is_success());
        assert_eq!(calls.get(), 1);
        assert_eq!(mock.sequence_writes(), vec![SequenceNumber::new(0)]);
    }

    #[test]
    fn test_no_change_required_reruns_same_sequence_number() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_current(5)
            .with_requested(5);
        let calls = Rc::new(Cell::new(0));
        let info = InitializationInfo::new("yaba", "1.0", false, counting_enable(calls.clone()));
        let ext = build(info, &mock);

        assert!(ext.dispatch(OperationName::Enable).is_success());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_success_message_from_callback() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(2);
        let info = InitializationInfo::new("yaba", "1.0", true, enable_returning("all good"));
        let ext = build(info, &mock);

        match ext.dispatch(OperationName::Enable) {
            Outcome::Succeeded { message, .. } => assert_eq!(message, "all good"),
            other => panic!("expected success, got {:?}", other),
        }
        assert_status(
            env.status_folder(),
            2,
            StatusType::Success,
            "Enable",
            "Enable succeeded: all good",
        );
    }

    #[test]
    fn test_transitioning_status_is_visible_to_callback() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(6);
        let seen = Rc::new(Cell::new(None));
        let seen_in_callback = seen.clone();
        let info = InitializationInfo::new("yaba", "1.0", true, move |ext: &VmExtension| {
            let item = read_status(&ext.handler_env().status_folder, 6);
            seen_in_callback.set(Some(item.status.status));
            Ok(String::new())
        });
        let ext = build(info, &mock);

        ext.dispatch(OperationName::Enable);
        assert_eq!(seen.get(), Some(StatusType::Transitioning));
    }

    #[test]
    fn test_callback_failure_reports_error() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(1);
        let info = InitializationInfo::new("yaba", "1.0", true, |_: &VmExtension| {
            Err(anyhow!("boom")).context("partially applied")
        });
        let ext = build(info, &mock);

        let outcome = ext.dispatch(OperationName::Enable);

        assert_eq!(outcome.exit_code(), 3);
        assert_status(
            env.status_folder(),
            1,
            StatusType::Error,
            "Enable",
            "Enable failed: partially applied: boom",
        );
        assert!(read_status(env.status_folder(), 1).status.substatuses.is_empty());
        // Sequence number was recorded before the callback ran
        assert_eq!(mock.sequence_writes(), vec![SequenceNumber::new(1)]);
    }

    #[test]
    fn test_custom_exit_code() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(1);
        let info = InitializationInfo::new("yaba", "1.0", true, |_: &VmExtension| Err(anyhow!("x")))
            .with_exit_codes(52, 17);
        let ext = build(info, &mock);

        assert_eq!(ext.dispatch(OperationName::Enable).exit_code(), 17);
    }

    #[test]
    fn test_error_clarification_substatus() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(7);
        let info = InitializationInfo::new("yaba", "1.0", true, |_: &VmExtension| {
            Err(ErrorWithClarification::new(42, "unhappy chipmunks").into())
        });
        let ext = build(info, &mock);

        ext.dispatch(OperationName::Enable);

        let item = read_status(env.status_folder(), 7);
        assert_eq!(item.status.status, StatusType::Error);
        assert_eq!(item.status.formatted_message.message, "Enable failed: unhappy chipmunks");
        assert_eq!(item.status.substatuses.len(), 1);
        let sub = &item.status.substatuses[0];
        assert_eq!(sub.name, "ErrorClarification");
        assert_eq!(sub.status, "error");
        assert_eq!(sub.code, 42);
    }

    #[test]
    fn test_sequence_number_write_failure_is_not_fatal() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_requested(2)
            .with_failing_sequence_writes();
        let calls = Rc::new(Cell::new(0));
        let info = InitializationInfo::new("yaba", "1.0", true, counting_enable(calls.clone()));
        let ext = build(info, &mock);

        assert!(ext.dispatch(OperationName::Enable).is_success());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unresolvable_requested_sequence_number_fails() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let calls = Rc::new(Cell::new(0));
        let info = InitializationInfo::new("yaba", "1.0", true, counting_enable(calls.clone()));
        let ext = build(info, &mock);

        let outcome = ext.dispatch(OperationName::Enable);
        assert_eq!(outcome.exit_code(), 3);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_enable_clears_disable_marker() {
        let env = TestHandlerEnv::new();
        std::fs::write(env.disable_marker(), "1").unwrap();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(1);
        let ext = build(default_info(true), &mock);
        assert!(ext.is_disabled());

        assert!(ext.dispatch(OperationName::Enable).is_success());
        assert!(!env.disable_marker().exists());
        assert!(!ext.is_disabled());
    }

    #[test]
    fn test_enable_leaves_marker_without_disable_support() {
        let env = TestHandlerEnv::new();
        std::fs::write(env.disable_marker(), "1").unwrap();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(1);
        let ext = build(default_info(true).with_supports_disable(false), &mock);

        assert!(ext.dispatch(OperationName::Enable).is_success());
        assert!(env.disable_marker().exists());
    }

    #[test]
    fn test_custom_status_formatter() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(1);
        let info = InitializationInfo::new("yaba", "1.0", true, enable_returning("ok"))
            .with_status_formatter(|op, status, msg| format!("[{}] {} <{}>", status, op, msg));
        let ext = build(info, &mock);

        ext.dispatch(OperationName::Enable);
        assert_status(
            env.status_folder(),
            1,
            StatusType::Success,
            "Enable",
            "[success] Enable <ok>",
        );
    }

    #[test]
    fn test_callback_reads_settings() {
        let env = TestHandlerEnv::new();
        let mut settings = vmext_handler::HandlerSettings::default();
        settings
            .public_settings
            .insert("commandToExecute".into(), "echo hi".into());
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_requested(1)
            .with_settings(settings);
        let info = InitializationInfo::new("yaba", "1.0", true, |ext: &VmExtension| {
            let settings = ext.settings()?;
            Ok(settings.public_settings["commandToExecute"]
                .as_str()
                .unwrap_or_default()
                .to_string())
        });
        let ext = build(info, &mock);

        match ext.dispatch(OperationName::Enable) {
            Outcome::Succeeded { message, .. } => assert_eq!(message, "echo hi"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_callback_raises_event() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(1);
        let info = InitializationInfo::new("yaba", "1.0", true, |ext: &VmExtension| {
            ext.events().log_informational_event("Enable", "hello from the extension");
            Ok(String::new())
        });
        let ext = build(info, &mock);

        ext.dispatch(OperationName::Enable);

        let events_folder = env.handler_env.events_folder.clone().unwrap();
        let events: Vec<_> = std::fs::read_dir(events_folder).unwrap().collect();
        assert_eq!(events.len(), 1);
        let raw = std::fs::read_to_string(events[0].as_ref().unwrap().path()).unwrap();
        assert!(raw.contains("hello from the extension"));
        assert!(raw.contains("1.0.0-test"));
    }
}

#[cfg(test)]
mod disable {
    use super::*;
    use anyhow::anyhow;
    use vmext_handler::{OperationName, StatusType};

    #[test]
    fn test_disable_creates_marker_and_reports() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(3);
        let ext = build(default_info(true), &mock);

        assert!(ext.dispatch(OperationName::Disable).is_success());
        assert!(env.disable_marker().exists());
        assert!(ext.is_disabled());
        assert_status(env.status_folder(), 3, StatusType::Success, "Disable", "Disable succeeded");
        // Disable never records a sequence number
        assert!(mock.sequence_writes().is_empty());
    }

    #[test]
    fn test_disable_twice_is_idempotent() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(3);
        let ext = build(default_info(true), &mock);

        assert!(ext.dispatch(OperationName::Disable).is_success());
        assert!(ext.dispatch(OperationName::Disable).is_success());
        assert!(env.disable_marker().exists());
    }

    #[test]
    fn test_disable_then_enable_with_new_sequence_number() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone())
            .with_current(3)
            .with_requested(3);
        let ext = build(default_info(true), &mock);
        assert!(ext.dispatch(OperationName::Disable).is_success());

        let mock = mock.with_requested(4);
        let ext = build(default_info(true), &mock);
        assert!(matches!(ext.dispatch(OperationName::Enable), Outcome::Succeeded { .. }));
        assert!(!env.disable_marker().exists());
    }

    #[test]
    fn test_no_support_and_no_callback_is_noop() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(3);
        let ext = build(default_info(true).with_supports_disable(false), &mock);

        assert!(ext.dispatch(OperationName::Disable).is_success());
        assert!(!env.disable_marker().exists());
        // The no-op still reports status
        assert_status(env.status_folder(), 3, StatusType::Success, "Disable", "Disable succeeded");
    }

    #[test]
    fn test_callback_runs_without_disable_support() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(3);
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let info = default_info(true)
            .with_supports_disable(false)
            .with_disable_callback(move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            });
        let ext = build(info, &mock);

        assert!(ext.dispatch(OperationName::Disable).is_success());
        assert_eq!(calls.get(), 1);
        assert!(!env.disable_marker().exists());
    }

    #[test]
    fn test_callback_failure_reports_error() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(3);
        let info = default_info(true).with_disable_callback(|_| Err(anyhow!("stuck")));
        let ext = build(info, &mock);

        let outcome = ext.dispatch(OperationName::Disable);
        assert_eq!(outcome.exit_code(), 3);
        assert_status(
            env.status_folder(),
            3,
            StatusType::Error,
            "Disable",
            "Disable failed: stuck",
        );
    }
}

#[cfg(test)]
mod other_operations {
    use super::*;
    use anyhow::anyhow;
    use vmext_handler::OperationName;

    #[test]
    fn test_install_creates_data_folder() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let ext = build(default_info(true), &mock);
        assert!(!env.data_folder().exists());

        assert!(ext.dispatch(OperationName::Install).is_success());
        assert!(env.data_folder().is_dir());
        assert_status_folder_empty(env.status_folder());
    }

    #[test]
    fn test_install_failure_uses_install_exit_code() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let info = default_info(true).with_install_callback(|_| Err(anyhow!("no disk")));
        let ext = build(info, &mock);

        let outcome = ext.dispatch(OperationName::Install);
        assert_eq!(outcome.exit_code(), 52);
        assert_status_folder_empty(env.status_folder());
    }

    #[test]
    fn test_uninstall_removes_data_folder() {
        let env = TestHandlerEnv::new();
        std::fs::create_dir_all(env.data_folder().join("nested")).unwrap();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let info = default_info(true).with_uninstall_callback(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        let ext = build(info, &mock);

        assert!(ext.dispatch(OperationName::Uninstall).is_success());
        assert!(!env.data_folder().exists());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_uninstall_without_data_folder() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let ext = build(default_info(true), &mock);

        assert!(ext.dispatch(OperationName::Uninstall).is_success());
    }

    #[test]
    fn test_reset_state_clears_data_contents() {
        let env = TestHandlerEnv::new();
        std::fs::create_dir_all(env.data_folder().join("cache")).unwrap();
        std::fs::write(env.data_folder().join("state.json"), "{}").unwrap();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let ext = build(default_info(true), &mock);

        assert!(ext.dispatch(OperationName::ResetState).is_success());
        assert!(env.data_folder().is_dir());
        assert_eq!(std::fs::read_dir(env.data_folder()).unwrap().count(), 0);
    }

    #[test]
    fn test_reset_state_without_support_keeps_data() {
        let env = TestHandlerEnv::new();
        std::fs::create_dir_all(env.data_folder()).unwrap();
        std::fs::write(env.data_folder().join("state.json"), "{}").unwrap();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let ext = build(default_info(true).with_supports_reset_state(false), &mock);

        assert!(ext.dispatch(OperationName::ResetState).is_success());
        assert!(env.data_folder().join("state.json").exists());
    }

    #[test]
    fn test_update_without_callback_is_noop() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let ext = build(default_info(true), &mock);

        match ext.dispatch(OperationName::Update) {
            Outcome::Succeeded { message, .. } => assert!(message.is_empty()),
            other => panic!("expected success, got {:?}", other),
        }
        assert_status_folder_empty(env.status_folder());
    }

    #[test]
    fn test_update_failure_uses_other_exit_code() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let info = default_info(true).with_update_callback(|_| Err(anyhow!("bad update")));
        let ext = build(info, &mock);

        assert_eq!(ext.dispatch(OperationName::Update).exit_code(), 3);
    }
}

#[cfg(test)]
mod command_line {
    use super::*;

    #[test]
    fn test_missing_operation_is_usage_error() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let ext = build(default_info(true), &mock);

        let outcome = ext.run(&["yaba"]);
        assert!(matches!(outcome, Outcome::Usage { .. }));
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    fn test_unknown_operation_is_usage_error() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone());
        let ext = build(default_info(true), &mock);

        match ext.run(&["yaba", "explode"]) {
            Outcome::Usage { text } => {
                assert!(text.contains("install|uninstall|enable|update|disable|resetstate"));
                assert!(text.contains(TEST_EXTENSION_VERSION));
            }
            other => panic!("expected usage, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_returns_exit_code() {
        let env = TestHandlerEnv::new();
        let mock = MockEnvironment::new(env.handler_env.clone()).with_requested(1);
        let ext = build(default_info(true), &mock);

        assert_eq!(ext.execute(["yaba".to_string(), "enable".to_string()]), 0);
        assert_eq!(ext.execute(["yaba".to_string()]), 2);
    }
}
