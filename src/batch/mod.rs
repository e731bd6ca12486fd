//! One upload, start to finish: roster → certificates → archive.

use tracing::{error, info, warn};

use crate::error::{BatchError, RenderError};
use crate::mail::Notifier;
use crate::pdf::{display_name, RenderCertificate, TemplateImage};
use crate::roster::parse_csv;
use crate::storage::{self, ARCHIVE_NAME};

pub struct BatchRequest<'a> {
    pub csv: &'a [u8],
    /// Uploaded background; `None` uses the default template.
    pub template: Option<&'a [u8]>,
    pub send_email: bool,
}

/// A row that produced no certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// 1-based data line number (the header is line 0).
    pub line: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub archive: Vec<u8>,
    pub generated: usize,
    pub failures: Vec<RowFailure>,
    pub mailed: usize,
}

/// Render every row, skipping rows that fail, and zip the rest.
///
/// Only a malformed roster or a failure to write the archive aborts the
/// batch. If every row fails the archive is valid but empty. Scratch files
/// are removed before returning, on success and on error.
pub fn run_batch<R>(
    renderer: &R,
    notifier: &Notifier,
    default_template: &[u8],
    request: BatchRequest<'_>,
) -> Result<BatchOutcome, BatchError>
where
    R: RenderCertificate + ?Sized,
{
    let rows = parse_csv(request.csv)?;
    let scratch = storage::create_scratch_dir().map_err(BatchError::Scratch)?;

    let template_bytes = request
        .template
        .filter(|t| !t.is_empty())
        .unwrap_or(default_template);
    let template = TemplateImage::prepare(template_bytes, scratch.path());
    if let Err(e) = &template {
        warn!("Template image unusable, every row will fail: {}", e);
    }

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    let mut mailed = 0;
    // One row at a time: each certificate goes straight to disk and only its
    // path is kept until the archive is assembled.
    for (i, row) in rows.iter().enumerate() {
        let result = match &template {
            Ok(template) => renderer.render(row, template, scratch.path()),
            Err(RenderError::Image(msg)) => Err(RenderError::Image(msg.clone())),
            Err(e) => Err(RenderError::Image(e.to_string())),
        };
        match result {
            Ok(document) => {
                info!("Generated {} ({})", document.file_name, document.registration_id);
                if request.send_email && notifier.notify(row, &document) {
                    mailed += 1;
                }
                documents.push(document.path);
            }
            Err(e) => {
                failures.push(RowFailure {
                    line: i + 1,
                    name: display_name(row).to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let archive_path = scratch.path().join(ARCHIVE_NAME);
    storage::build_archive(&documents, &archive_path).map_err(|e| {
        error!("Archive assembly failed: {}", e);
        e
    })?;
    let archive = std::fs::read(&archive_path).map_err(|e| BatchError::Archive(e.into()))?;

    info!(
        "Batch finished: {} rows, {} generated, {} failed, {} mailed",
        rows.len(),
        documents.len(),
        failures.len(),
        mailed
    );
    for failure in &failures {
        warn!("Skipped row {} ({}): {}", failure.line, failure.name, failure.reason);
    }
    if documents.is_empty() && !rows.is_empty() {
        warn!("No certificate could be generated for this batch");
    }

    Ok(BatchOutcome {
        archive,
        generated: documents.len(),
        failures,
        mailed,
    })
}
