// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runtime switches shared between the application and the flush task.
//! Cloned handles observe and control the same value.

use crate::record::Severity;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStatus {
    Inactive,
    Active,
}

/// Turns delivery on and off. While inactive, flushed batches are discarded
/// unsent.
#[derive(Debug, Clone)]
pub struct ActivationSwitch {
    active: Arc<AtomicBool>,
}

impl ActivationSwitch {
    #[must_use]
    pub fn new(status: ActivationStatus) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(status == ActivationStatus::Active)),
        }
    }

    pub fn activate(&self) {
        self.set_status(ActivationStatus::Active);
    }

    pub fn deactivate(&self) {
        self.set_status(ActivationStatus::Inactive);
    }

    pub fn set_status(&self, status: ActivationStatus) {
        self.active
            .store(status == ActivationStatus::Active, Ordering::Release);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn status(&self) -> ActivationStatus {
        if self.is_active() {
            ActivationStatus::Active
        } else {
            ActivationStatus::Inactive
        }
    }
}

impl Default for ActivationSwitch {
    fn default() -> Self {
        Self::new(ActivationStatus::Active)
    }
}

/// Minimum severity adjustable at runtime. Applied on top of the configured
/// minimum level: the stricter of the two wins.
#[derive(Debug, Clone)]
pub struct LevelSwitch {
    level: Arc<AtomicU8>,
}

impl LevelSwitch {
    #[must_use]
    pub fn new(level: Severity) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level as u8)),
        }
    }

    #[must_use]
    pub fn minimum_level(&self) -> Severity {
        Severity::from_index(self.level.load(Ordering::Acquire)).unwrap_or(Severity::Verbose)
    }

    pub fn set_minimum_level(&self, level: Severity) {
        self.level.store(level as u8, Ordering::Release);
    }

    #[must_use]
    pub fn is_enabled(&self, severity: Severity) -> bool {
        severity >= self.minimum_level()
    }
}

impl Default for LevelSwitch {
    fn default() -> Self {
        Self::new(Severity::Verbose)
    }
}
