//! Results page: experiment summary and drift list.

use dynamik_common::{DriftOverview, ExecutionStatus, Experiment, Status};

use super::{escape, format_date, format_window, page, time_ago};

pub fn results_page(experiment: &Experiment, status: &ExecutionStatus) -> String {
    let body = format!(r#"
    <div class="results" data-experiment="{}">
        {}
        <ol id="drifts" class="drift-list">{}
        </ol>
    </div>"#,
        escape(&experiment.id),
        summary(experiment, status),
        drift_list(&experiment.id, &status.drifts));

    page(
        "Results",
        &body,
        r#"<script src="/static/js/results.js"></script>"#,
    )
}

/// Summary card. Shape depends on the execution state: indeterminate bar
/// while queued, progress and current windows while running, download link
/// once finished, failure notice when failed. Every part is rendered with a
/// stable id so `results.js` can switch between them from live snapshots.
pub fn summary(experiment: &Experiment, status: &ExecutionStatus) -> String {
    let state = status.state();
    let hidden = |shown: bool| if shown { "" } else { " hidden" };

    let config: String = [
        ("Window size", experiment.config.window_size.as_deref()),
        ("Drift magnitude", experiment.config.drift_magnitude.as_deref()),
        ("Warnings", experiment.config.warnings.as_deref()),
    ]
    .iter()
    .map(|(label, value)| format!("<tr><th>{}</th><td>{}</td></tr>", label, escape(value.unwrap_or("-"))))
    .collect();

    let drift_count = if state == Status::Queued {
        "-".to_string()
    } else {
        status.drifts.len().to_string()
    };

    let bar = match state {
        Status::Queued => r#"<span id="progress-bar" class="progress-bar indeterminate"></span>"#.to_string(),
        _ => format!(
            r#"<span id="progress-bar" class="progress-bar" style="width: {}%"></span>"#,
            if state == Status::Running { status.progress_percent() } else { 0 }
        ),
    };

    let finished_ago = if state == Status::Finished {
        format!("Finished {} ago.", time_ago(&status.last_update_date))
    } else {
        String::new()
    };

    let failure = if state == Status::Failed {
        status.status.error.as_deref().unwrap_or(FAILED_DEFAULT)
    } else {
        ""
    };

    format!(r#"
        <section id="summary" class="summary status-{state}">
            <header>
                <div>
                    <h1>Experiment summary</h1>
                    <span class="meta">Submitted {} ago ({}).</span>
                    <span id="finished-at" class="meta"{}>{}</span>
                </div>
                {}
            </header>
            <div class="summary-body">
                <table class="config">{}</table>
                <p class="drift-count"><span id="drift-count">{}</span> drifts found</p>
            </div>
            <div id="progress" class="progress"{}>{}</div>
            <div id="windows" class="windows"{}>
                <span><h3>Current reference window</h3><p id="current-ref">{}</p></span>
                <span><h3>Current running window</h3><p id="current-run">{}</p></span>
            </div>
            <p id="failure" class="failure" data-default="{}"{}>{}</p>
        </section>"#,
        time_ago(&experiment.submitted),
        format_date(&experiment.submitted),
        hidden(state == Status::Finished),
        finished_ago,
        badge(&experiment.id, state),
        config,
        drift_count,
        hidden(!state.is_terminal()),
        bar,
        hidden(state == Status::Running),
        escape(&format_window(&status.status.current_ref)),
        escape(&format_window(&status.status.current_run)),
        FAILED_DEFAULT,
        hidden(state == Status::Failed),
        escape(failure))
}

const FAILED_DEFAULT: &str = "The experiment could not be processed.";

fn badge(experiment_id: &str, state: Status) -> String {
    match state {
        Status::Queued => r#"<span id="status-badge" class="badge badge-queued">Queued</span>"#.to_string(),
        Status::Running => r#"<span id="status-badge" class="badge badge-running">Running</span>"#.to_string(),
        Status::Finished => format!(
            r#"<a id="status-badge" class="badge badge-download" href="/results/{}/download">Download</a>"#,
            escape(experiment_id)
        ),
        Status::Failed => r#"<span id="status-badge" class="badge badge-failed">Failed</span>"#.to_string(),
    }
}

pub fn drift_list(experiment_id: &str, drifts: &[DriftOverview]) -> String {
    let id = escape(experiment_id);
    drifts.iter().map(|drift| {
        format!(r#"
            <li class="drift">
                <details open>
                    <summary>
                        <h2>Drift {}</h2>
                        <span>between ({}) and ({})</span>
                    </summary>
                    <div class="drift-body">
                        <p>{}</p>
                        <menu>
                            <li><a href="/results/{id}/{}/download">Download JSON</a></li>
                            <li><a href="/results/{id}/{}">View details</a></li>
                        </menu>
                    </div>
                </details>
            </li>"#,
            drift.index + 1,
            escape(&format_window(&drift.reference_window)),
            escape(&format_window(&drift.running_window)),
            escape(&drift.description),
            drift.index,
            drift.index)
    }).collect()
}
