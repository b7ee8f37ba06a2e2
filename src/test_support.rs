//! Shared fixtures and scripted doubles for tests.

use std::sync::Mutex;

use anyhow::Result;

use crate::core::item::Complexity;
use crate::core::outcome::TaskOutcome;
use crate::document::{Document, ModuleRecord, SubModuleRecord};
use crate::io::worker::{InvokeRequest, Worker};

/// Small document covering both nesting levels and all complexity tiers:
/// Employee (high) with Profile (medium) and Documents (low), plus Payroll
/// (high).
pub fn sample_document() -> Document {
    Document {
        modules: vec![
            ModuleRecord {
                name: "Employee".to_string(),
                complexity: Some(Complexity::High),
                analyzed: false,
                sub_modules: vec![
                    SubModuleRecord {
                        name: "Profile".to_string(),
                        complexity: Some(Complexity::Medium),
                        analyzed: false,
                    },
                    SubModuleRecord {
                        name: "Documents".to_string(),
                        complexity: Some(Complexity::Low),
                        analyzed: false,
                    },
                ],
            },
            ModuleRecord {
                name: "Payroll".to_string(),
                complexity: Some(Complexity::High),
                analyzed: false,
                sub_modules: Vec::new(),
            },
        ],
    }
}

/// Worker double that records every request and replays scripted outcomes.
/// Once the script runs out, remaining invocations succeed.
pub struct ScriptedWorker {
    calls: Mutex<Vec<InvokeRequest>>,
    outcomes: Mutex<Vec<TaskOutcome>>,
}

impl ScriptedWorker {
    /// Worker whose every invocation succeeds.
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(outcomes: Vec<TaskOutcome>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(outcomes),
        }
    }

    /// Every request seen so far, in invocation order.
    pub fn calls(&self) -> Vec<InvokeRequest> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Worker for ScriptedWorker {
    fn invoke(&self, request: &InvokeRequest) -> Result<TaskOutcome> {
        self.calls.lock().expect("calls lock").push(request.clone());
        let mut outcomes = self.outcomes.lock().expect("outcomes lock");
        if outcomes.is_empty() {
            Ok(TaskOutcome::Success)
        } else {
            Ok(outcomes.remove(0))
        }
    }
}
