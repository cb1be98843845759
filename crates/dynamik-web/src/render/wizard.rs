//! Setup wizard page.

use std::collections::HashMap;

use dynamik_common::model::{DRIFT_MAGNITUDES, WARNING_COUNTS, WINDOW_SIZES};
use dynamik_common::{LogField, DISCOVER_ENABLEMENT};
use dynamik_experiments::{Draft, Step, Toast};

use super::{escape, page, toast};

struct ConfigField {
    key: &'static str,
    label: &'static str,
    description: &'static str,
    values: &'static [&'static str],
}

const CONFIG_FIELDS: [ConfigField; 3] = [
    ConfigField {
        key: "window_size",
        label: "Window size",
        description: "The window size determines the amount of time represented by each of the windows.",
        values: WINDOW_SIZES,
    },
    ConfigField {
        key: "drift_magnitude",
        label: "Drift magnitude",
        description: "The drift magnitude represents the minimum difference in time between the reference and the running windows considered as a drift.",
        values: DRIFT_MAGNITUDES,
    },
    ConfigField {
        key: "warnings",
        label: "Number of warnings",
        description: "The number of warnings specifies the amount of alerts before a drift is confirmed.",
        values: WARNING_COUNTS,
    },
];

/// `preview` holds the first records of the uploaded log, shown on the
/// mapping step.
pub fn wizard_page(draft: &Draft, preview: &[Vec<String>], notice: Option<&Toast>) -> String {
    let active = draft.wizard.active;

    let steps: String = Step::ALL.iter().map(|step| {
        let marker = if draft.wizard.validity_of(*step) == Some(false) {
            r#"<span class="step-invalid" title="This step has errors">!</span>"#
        } else {
            ""
        };
        format!(r#"
        <li class="step{}">
            <button type="submit" form="wizard" name="action" value="go:{}">{}</button>{}
        </li>"#,
            if *step == active { " active" } else { "" },
            step.index(),
            escape(step.label()),
            marker)
    }).collect();

    let content = match active {
        Step::Mapping => mapping_step(draft, preview),
        Step::Configuration => configuration_step(draft),
        Step::Review => review_step(draft),
    };

    let prev = if active != Step::Mapping {
        r#"<button type="submit" form="wizard" name="action" value="prev" class="btn">Previous</button>"#
    } else {
        ""
    };
    let next = if active.is_last() {
        r#"<button type="submit" form="wizard" name="action" value="run" class="btn btn-run">Run</button>"#
    } else {
        r#"<button type="submit" form="wizard" name="action" value="next" class="btn">Next</button>"#
    };

    let body = format!(r#"
    <ol class="stepper">{}
    </ol>
    <form id="wizard" method="POST" action="/setup-experiment?draft={}" class="wizard-card">
        <h1 class="step-title">{}</h1>
        {}
    </form>
    <nav class="wizard-nav">
        {}
        {}
    </nav>
    {}"#,
        steps,
        draft.id,
        escape(active.label()),
        content,
        prev,
        next,
        notice.map(toast).unwrap_or_default());

    page("Setup experiment", &body, "")
}

// ── Steps ─────────────────────────────────────────────────────────────────────

fn mapping_step(draft: &Draft, preview: &[Vec<String>]) -> String {
    // Columns chosen for more than one field are flagged.
    let mut uses: HashMap<&str, usize> = HashMap::new();
    for field in LogField::ALL {
        if let Some(column) = draft.mapping.get(field) {
            *uses.entry(column).or_default() += 1;
        }
    }

    let inputs: String = LogField::ALL.iter().map(|field| {
        let current = draft.mapping.get(*field);
        let invalid = current.is_some_and(|c| uses.get(c).copied().unwrap_or(0) > 1);

        let mut options = String::new();
        if current.is_none() {
            options.push_str(r#"<option value="" selected>Choose a column</option>"#);
        }
        if *field == LogField::Enablement {
            options.push_str(&option(DISCOVER_ENABLEMENT, "Discover from log", current));
        }
        for header in &draft.headers {
            options.push_str(&option(header, header, current));
        }

        format!(r#"
            <label class="field">
                <span>{}</span>
                <select name="{}"{}>{}</select>
            </label>"#,
            escape(field.label()),
            field.name(),
            if invalid { r#" class="invalid""# } else { "" },
            options)
    }).collect();

    let preview_rows: String = preview.iter().map(|row| {
        format!("<tr>{}</tr>", row.iter().map(|cell| format!("<td>{}</td>", escape(cell))).collect::<String>())
    }).collect();
    let preview_table = if preview_rows.is_empty() {
        String::new()
    } else {
        format!(r#"<table class="preview">{preview_rows}</table>"#)
    };

    format!(r#"
        <p class="step-help">
            Configure the mapping between the log attributes and the CSV file columns.
            The rest of the columns from the CSV will be considered as additional log attributes.
        </p>
        {}
        <div class="fields">{}
        </div>"#,
        preview_table,
        inputs)
}

fn option(value: &str, label: &str, current: Option<&str>) -> String {
    format!(r#"<option value="{}"{}>{}</option>"#,
        escape(value),
        if current == Some(value) { " selected" } else { "" },
        escape(label))
}

fn configuration_step(draft: &Draft) -> String {
    let current = draft.config.entries();

    CONFIG_FIELDS.iter().zip(current).map(|(field, (_, value))| {
        let radios: String = field.values.iter().map(|choice| {
            format!(r#"
                <label class="radio"><input type="radio" name="{}" value="{}"{}><span>{}</span></label>"#,
                field.key,
                escape(choice),
                if value == Some(*choice) { " checked" } else { "" },
                escape(choice))
        }).collect();

        format!(r#"
        <fieldset class="config-field">
            <legend>{}</legend>
            <p class="step-help">{}</p>
            <div class="radio-group">{}
            </div>
        </fieldset>"#,
            field.label,
            field.description,
            radios)
    }).collect()
}

fn review_step(draft: &Draft) -> String {
    let files: String = draft.logs.iter()
        .map(|log| format!("<li>{}</li>", escape(&log.name)))
        .collect();

    let mapping: String = LogField::ALL.iter().map(|field| {
        let value = match draft.mapping.get(*field) {
            Some(DISCOVER_ENABLEMENT) => r#"<em>Discover</em>"#.to_string(),
            Some(column) => escape(column),
            None => "-".to_string(),
        };
        format!("<tr><td>{}</td><td>→</td><td>{}</td></tr>", field.name(), value)
    }).collect();

    let setup: String = draft.config.entries().iter().map(|(key, value)| {
        format!("<li><span>{}</span><em>{}</em></li>", key, escape(value.unwrap_or("-")))
    }).collect();

    format!(r#"
        <p class="step-help">
            Please, check that the files, mapping and configuration specified are correct.
            If you want to receive a notification when the results are available, introduce your email address below.
        </p>
        <div class="review-grid">
            <div class="review-card"><h3>Files</h3><ul>{}</ul></div>
            <div class="review-card"><h3>Mapping</h3><table>{}</table></div>
            <div class="review-card"><h3>Setup</h3><ul>{}</ul></div>
        </div>
        <label class="field">
            <span>Email (optional)</span>
            <input type="email" name="email" value="{}" placeholder="you@example.com">
        </label>"#,
        files,
        mapping,
        setup,
        escape(&draft.email))
}
