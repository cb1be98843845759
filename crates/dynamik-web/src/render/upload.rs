//! Upload page.

use dynamik_common::units::format_size;

use super::{escape, page};

pub fn upload_page(error: Option<&str>, max_bytes: u64) -> String {
    let banner = match error {
        Some(message) => format!(r#"
    <div class="toast toast-error" role="alert">
        <strong>Upload failed</strong>
        <p>{}</p>
    </div>"#, escape(message)),
        None => String::new(),
    };

    let body = format!(r#"
    <div class="page-header">
        <h1 class="page-title">Upload your event log</h1>
        <p class="text-muted">
            Drop a CSV event log to start a new experiment. Each row is one activity
            instance; you will map its columns in the next step.
        </p>
    </div>
    {}
    <form method="POST" action="/" enctype="multipart/form-data" class="dropzone">
        <input type="file" name="files" id="files" accept=".csv,text/csv" required>
        <label for="files">Drop your log file or click to browse</label>
        <p class="text-muted small">Only CSV files allowed, up to {}.</p>
        <button type="submit" class="btn btn-primary">Continue</button>
    </form>"#,
        banner,
        format_size(max_bytes));

    page("Upload", &body, "")
}
