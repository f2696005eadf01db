//! Capability gate for biometric attempts
//!
//! Four independent preconditions must hold before a session may start an
//! attempt. Each is a fresh query against the [`DeviceContext`]; a failing
//! condition is reported as `false` plus a warning, never as an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::device::DeviceContext;

/// One precondition of the capability gate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    /// Secure lock screen configured
    KeyguardSecure,
    /// Runtime permission for the sensor
    Permission,
    /// At least one biometric enrolled
    Enrollment,
    /// Compatible sensor hardware present
    Hardware,
}

impl Requirement {
    /// What the user should do to satisfy this requirement
    pub fn remediation(&self) -> &'static str {
        match self {
            Requirement::KeyguardSecure => "Enable a secure screen lock in settings",
            Requirement::Permission => "Biometric permission has not been granted",
            Requirement::Enrollment => "Enroll at least one fingerprint in settings",
            Requirement::Hardware => "No compatible biometric hardware detected",
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.remediation())
    }
}

/// Immutable snapshot of the four capability conditions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityResult {
    /// Secure lock screen configured
    pub keyguard_secure: bool,
    /// Runtime permission held
    pub has_permission: bool,
    /// At least one template enrolled
    pub has_enrollment: bool,
    /// Sensor hardware detected
    pub hardware_present: bool,
}

impl CapabilityResult {
    /// Build a snapshot from the four conditions
    pub fn new(
        keyguard_secure: bool,
        has_permission: bool,
        has_enrollment: bool,
        hardware_present: bool,
    ) -> Self {
        Self {
            keyguard_secure,
            has_permission,
            has_enrollment,
            hardware_present,
        }
    }

    /// All four conditions hold
    pub fn is_ready(&self) -> bool {
        self.keyguard_secure && self.has_permission && self.has_enrollment && self.hardware_present
    }

    /// Failing requirements, keyguard first
    pub fn unmet(&self) -> Vec<Requirement> {
        [
            (self.keyguard_secure, Requirement::KeyguardSecure),
            (self.has_permission, Requirement::Permission),
            (self.has_enrollment, Requirement::Enrollment),
            (self.hardware_present, Requirement::Hardware),
        ]
        .into_iter()
        .filter(|(met, _)| !met)
        .map(|(_, requirement)| requirement)
        .collect()
    }

    /// Remediation message for the first failing requirement
    pub fn remediation(&self) -> Option<&'static str> {
        self.unmet().first().map(Requirement::remediation)
    }
}

/// Stateless capability queries
pub struct CapabilityChecker;

impl CapabilityChecker {
    /// Query all four conditions
    pub fn evaluate(device: &dyn DeviceContext) -> CapabilityResult {
        CapabilityResult {
            keyguard_secure: Self::is_keyguard_secure(device),
            has_permission: Self::has_permission(device),
            has_enrollment: Self::has_enrollment(device),
            hardware_present: Self::is_hardware_present(device),
        }
    }

    /// The sole gate for starting an attempt
    pub fn check(device: &dyn DeviceContext) -> bool {
        Self::evaluate(device).is_ready()
    }

    /// Secure lock screen configured
    pub fn is_keyguard_secure(device: &dyn DeviceContext) -> bool {
        let secure = device.is_keyguard_secure();
        if !secure {
            warn!("Secure lock screen is not enabled");
        }
        secure
    }

    /// Runtime permission held
    pub fn has_permission(device: &dyn DeviceContext) -> bool {
        let granted = device.has_biometric_permission();
        if !granted {
            warn!("Biometric permission not granted");
        }
        granted
    }

    /// Service available, permission held, and at least one template enrolled
    pub fn has_enrollment(device: &dyn DeviceContext) -> bool {
        if !device.biometric_service_available() {
            warn!("Biometric service unavailable, cannot query enrollment");
            return false;
        }
        // The enrollment query itself requires the permission; reported by has_permission
        if !device.has_biometric_permission() {
            debug!("Biometric permission not granted, cannot query enrollment");
            return false;
        }
        let enrolled = device.has_enrolled_biometrics();
        if !enrolled {
            warn!("No biometric enrolled");
        }
        enrolled
    }

    /// Service available, permission held, and sensor hardware detected
    pub fn is_hardware_present(device: &dyn DeviceContext) -> bool {
        if !device.biometric_service_available() {
            warn!("Biometric service unavailable");
            return false;
        }
        if !device.has_biometric_permission() {
            debug!("Biometric permission not granted, cannot query hardware");
            return false;
        }
        let detected = device.is_hardware_detected();
        if !detected {
            warn!("No biometric hardware detected");
        }
        detected
    }
}
