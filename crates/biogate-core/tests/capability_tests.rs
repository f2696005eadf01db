//! Integration tests for the capability gate

use std::io;
use std::sync::{Arc, Mutex};

use biogate_core::{
    AttemptHandle, CapabilityChecker, CapabilityResult, CoreError, DeviceContext, Requirement,
};

/// Device answering from fixed flags
struct FixedDevice {
    keyguard_secure: bool,
    permission: bool,
    service_available: bool,
    hardware_detected: bool,
    enrolled: bool,
}

impl FixedDevice {
    fn ready() -> Self {
        Self {
            keyguard_secure: true,
            permission: true,
            service_available: true,
            hardware_detected: true,
            enrolled: true,
        }
    }
}

impl DeviceContext for FixedDevice {
    fn is_keyguard_secure(&self) -> bool {
        self.keyguard_secure
    }

    fn has_biometric_permission(&self) -> bool {
        self.permission
    }

    fn biometric_service_available(&self) -> bool {
        self.service_available
    }

    fn is_hardware_detected(&self) -> bool {
        self.hardware_detected
    }

    fn has_enrolled_biometrics(&self) -> bool {
        self.enrolled
    }

    fn attempt_handle(&self) -> biogate_core::Result<Box<dyn AttemptHandle>> {
        Err(CoreError::AttemptUnavailable("fixed device".to_string()))
    }
}

#[test]
fn test_is_ready_truth_table() {
    for bits in 0u8..16 {
        let keyguard = bits & 0b0001 != 0;
        let permission = bits & 0b0010 != 0;
        let enrollment = bits & 0b0100 != 0;
        let hardware = bits & 0b1000 != 0;

        let result = CapabilityResult::new(keyguard, permission, enrollment, hardware);
        let expected = keyguard && permission && enrollment && hardware;

        assert_eq!(result.is_ready(), expected, "case {:04b}", bits);
        assert_eq!(result.unmet().is_empty(), expected, "case {:04b}", bits);
    }
}

#[test]
fn test_ready_device_passes_gate() {
    let device = FixedDevice::ready();
    let result = CapabilityChecker::evaluate(&device);
    assert_eq!(result, CapabilityResult::new(true, true, true, true));
    assert!(CapabilityChecker::check(&device));
}

#[test]
fn test_missing_enrollment_fails_gate() {
    let device = FixedDevice {
        enrolled: false,
        ..FixedDevice::ready()
    };
    let result = CapabilityChecker::evaluate(&device);
    assert_eq!(result, CapabilityResult::new(true, true, false, true));
    assert!(!CapabilityChecker::check(&device));
    assert_eq!(result.unmet(), vec![Requirement::Enrollment]);
}

#[test]
fn test_permission_required_for_hardware_and_enrollment() {
    let device = FixedDevice {
        permission: false,
        ..FixedDevice::ready()
    };
    let result = CapabilityChecker::evaluate(&device);
    assert!(result.keyguard_secure);
    assert!(!result.has_permission);
    assert!(!result.has_enrollment);
    assert!(!result.hardware_present);
}

#[test]
fn test_missing_service_fails_hardware_and_enrollment() {
    let device = FixedDevice {
        service_available: false,
        ..FixedDevice::ready()
    };
    assert!(!CapabilityChecker::is_hardware_present(&device));
    assert!(!CapabilityChecker::has_enrollment(&device));
    assert!(CapabilityChecker::has_permission(&device));
    assert!(CapabilityChecker::is_keyguard_secure(&device));
}

#[test]
fn test_insecure_keyguard_fails_gate() {
    let device = FixedDevice {
        keyguard_secure: false,
        ..FixedDevice::ready()
    };
    let result = CapabilityChecker::evaluate(&device);
    assert!(!result.is_ready());
    assert_eq!(
        result.remediation(),
        Some(Requirement::KeyguardSecure.remediation())
    );
}

/// Log sink shared between the subscriber and the test
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_missing_permission_warns_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let device = FixedDevice {
        permission: false,
        ..FixedDevice::ready()
    };
    let result = tracing::subscriber::with_default(subscriber, || {
        CapabilityChecker::evaluate(&device)
    });
    assert!(!result.is_ready());

    let warnings: Vec<_> = logs
        .lines()
        .into_iter()
        .filter(|line| line.contains("WARN"))
        .collect();
    assert_eq!(warnings.len(), 1, "unexpected warnings: {warnings:?}");
    assert!(warnings[0].contains("Biometric permission not granted"));
}
