//! Test-only helpers: a scripted Terraform and canned tool output.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::types::InvocationResult;
use crate::io::terraform::{Step, Terraform};

/// One queued response: a captured result, or a collaborator error message.
#[derive(Debug, Clone)]
pub enum Scripted {
    Result(InvocationResult),
    Error(String),
}

/// Terraform double that replays queued responses in order and records calls.
///
/// Running out of responses is an error, which shows up as an extra call in
/// `calls()` and an `Err` from `invoke`.
#[derive(Debug, Default)]
pub struct ScriptedTerraform {
    responses: RefCell<VecDeque<Scripted>>,
    calls: RefCell<Vec<(Step, PathBuf)>>,
}

impl ScriptedTerraform {
    pub fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn from_results(results: Vec<InvocationResult>) -> Self {
        Self::new(results.into_iter().map(Scripted::Result).collect())
    }

    /// Steps invoked so far, in order.
    pub fn calls(&self) -> Vec<Step> {
        self.calls.borrow().iter().map(|(step, _)| *step).collect()
    }

    pub fn workdirs(&self) -> Vec<PathBuf> {
        self.calls.borrow().iter().map(|(_, dir)| dir.clone()).collect()
    }

    pub fn mutation_calls(&self) -> usize {
        self.calls().into_iter().filter(|step| step.is_mutation()).count()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Terraform for ScriptedTerraform {
    fn invoke(&self, step: Step, workdir: &Path) -> Result<InvocationResult> {
        self.calls
            .borrow_mut()
            .push((step, workdir.to_path_buf()));
        match self.responses.borrow_mut().pop_front() {
            Some(Scripted::Result(result)) => Ok(result),
            Some(Scripted::Error(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left for {}", step.name())),
        }
    }
}

/// `terraform plan` output for a create with pending changes (exit 2).
pub fn plan_with_changes() -> InvocationResult {
    InvocationResult::exited(
        2,
        "Refreshing Terraform state in-memory prior to plan...\n\
         \n\
         An execution plan has been generated and is shown below.\n\
         \x20 + azurerm_resource_group.rg\n\
         \x20 + azurerm_virtual_machine.vm\n\
         \n\
         Plan: 2 to add, 0 to change, 0 to destroy.\n",
        "",
    )
}

/// `terraform plan -destroy` output with pending removals (exit 2).
pub fn destroy_plan_with_changes() -> InvocationResult {
    InvocationResult::exited(
        2,
        "azurerm_resource_group.rg: Refreshing state... [id=/subscriptions/x/rg]\n\
         \x20 - azurerm_resource_group.rg\n\
         \x20 - azurerm_virtual_machine.vm\n\
         \n\
         Plan: 0 to add, 0 to change, 2 to destroy.\n",
        "",
    )
}

/// `terraform plan` output when nothing needs to change (exit 0).
pub fn plan_without_changes() -> InvocationResult {
    InvocationResult::exited(
        0,
        "Refreshing Terraform state in-memory prior to plan...\n\
         \n\
         No changes. Infrastructure is up-to-date.\n",
        "",
    )
}

/// `terraform plan -destroy` when nothing is left to remove (exit 0).
pub fn empty_destroy_plan() -> InvocationResult {
    InvocationResult::exited(0, "No changes. No objects need to be destroyed.\n", "")
}

pub fn apply_complete() -> InvocationResult {
    InvocationResult::exited(
        0,
        "azurerm_resource_group.rg: Creating...\n\
         azurerm_resource_group.rg: Creation complete after 1s\n\
         \n\
         Apply complete! Resources: 2 added, 0 changed, 0 destroyed.\n",
        "",
    )
}

pub fn destroy_complete() -> InvocationResult {
    InvocationResult::exited(
        0,
        "azurerm_resource_group.rg: Destroying...\n\
         \n\
         Destroy complete! Resources: 2 destroyed.\n",
        "",
    )
}

/// A failed step whose stderr ends with `error_line`.
pub fn failed_with(error_line: &str) -> InvocationResult {
    InvocationResult::exited(1, "azurerm_virtual_machine.vm: Creating...\n", format!("\n{error_line}\n"))
}

pub fn retryable_failure() -> InvocationResult {
    failed_with("Error: waiting for VM creation: context deadline exceeded")
}
