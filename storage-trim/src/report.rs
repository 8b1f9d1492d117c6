// SPDX-License-Identifier: GPL-3.0-only

use storage_sys::{Action, ApplyOutcome, ApplyResult, TrimReport};

/// Human-readable lines for a finished run.
pub fn render(report: &TrimReport) -> Vec<String> {
    let name = &report.device.name;
    let mut lines = Vec::new();

    if report.discard_status.enabled {
        lines.push(format!(
            "TRIM is enabled for {name} (disc-max {}).",
            report.discard_status.disc_max
        ));
    } else {
        lines.push(format!("TRIM is not enabled for {name}."));
    }

    let Action::EnablePlan {
        discard_limit_bytes,
        ..
    } = report.action
    else {
        return lines;
    };

    for result in &report.provisioning {
        lines.push(render_provisioning(result));
    }

    if let Some(limit) = &report.discard_limit {
        let verb = if report.dry_run { "Would set" } else { "Set" };
        lines.push(format!(
            "{verb} the maximum number of bytes to discard in {} to {discard_limit_bytes}.",
            limit.path.display()
        ));
    }

    if report.dry_run {
        lines.push("Dry run: no control files were written.".to_string());
    }

    lines
}

fn render_provisioning(result: &ApplyResult) -> String {
    let path = result.path.display();
    let previous = result.previous.as_deref().unwrap_or("").trim_end();
    let current = result.current.trim_end();

    match result.outcome {
        ApplyOutcome::AlreadyCorrect => {
            format!("The provisioning mode in {path} is already set to \"{current}\".")
        }
        ApplyOutcome::Updated => {
            format!("Set the provisioning mode in {path} from \"{previous}\" to \"{current}\".")
        }
        ApplyOutcome::WouldUpdate => format!(
            "Would set the provisioning mode in {path} from \"{previous}\" to \"{current}\"."
        ),
    }
}
