//! Batch generation: rows in, PDF buffers out
//!
//! One job runs strictly row by row on the calling thread:
//! 1. Validate the job and load the template (rejecting non-PNG input)
//! 2. Load the font and prepare it for embedding
//! 3. Render each row onto a page, checking for cancellation first
//! 4. Report progress every few rows and yield every few more
//!
//! `per-row` mode writes one single-page document per row; `single` mode
//! adds every page to one document serialized at the end.

use crate::constants::MAX_FONT_SIZE;
use crate::field::{Field, Row};
use crate::font::{FontCache, FontSource, Typeface};
use crate::options::GenerationOptions;
use crate::render::{DocumentBuilder, FontPayload, PageSpec, render_page};
use crate::shaping::{ShapeMemo, ShapingPipeline, TextShaper};
use crate::template::{TemplateCache, TemplateSource};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Shape of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One multi-page document
    Single,
    /// One single-page document per row
    #[default]
    PerRow,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Single => f.write_str("single"),
            OutputMode::PerRow => f.write_str("per-row"),
        }
    }
}

/// Rows finished so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// Receives progress notifications during a job
pub trait ProgressSink {
    fn on_progress(&self, progress: Progress);
}

impl<F: Fn(Progress)> ProgressSink for F {
    fn on_progress(&self, progress: Progress) {
        self(progress)
    }
}

/// Sink that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _: Progress) {}
}

/// Shared abort signal, checked before each row
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the same handle can guard the next job
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Caches that outlive a single job
#[derive(Debug, Default)]
pub struct ResourceCache {
    pub fonts: FontCache,
    pub templates: TemplateCache,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one generation call consumes
#[derive(Clone)]
pub struct GenerationJob {
    pub rows: Vec<Row>,
    pub fields: Vec<Field>,
    pub template: Arc<dyn TemplateSource>,
    pub mode: OutputMode,
    /// Explicit page size; derived from the template's aspect when absent
    pub page_size: Option<PageSize>,
}

impl GenerationJob {
    pub fn new(
        rows: Vec<Row>,
        fields: Vec<Field>,
        template: Arc<dyn TemplateSource>,
        mode: OutputMode,
    ) -> Self {
        Self {
            rows,
            fields,
            template,
            mode,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Reject jobs that cannot produce output, before any work is done
    pub fn validate(&self, max_rows: usize) -> Result<()> {
        if self.rows.is_empty() {
            return Err(GenerationError::EmptyDataset);
        }
        if self.rows.len() > max_rows {
            return Err(GenerationError::Config(format!(
                "Dataset has {} rows, the limit is {max_rows}",
                self.rows.len()
            )));
        }
        if let Some(page_size) = &self.page_size {
            page_size.validate()?;
        }
        for field in &self.fields {
            validate_field(field)?;
        }
        Ok(())
    }
}

fn validate_field(field: &Field) -> Result<()> {
    let size = field.font_size;
    if !size.is_finite() || size <= 0.0 || size > MAX_FONT_SIZE {
        return Err(GenerationError::Config(format!(
            "Field '{}' has font size {size}, expected 0 < size <= {MAX_FONT_SIZE}",
            field.id
        )));
    }
    let finite = [Some(field.x), Some(field.y), field.max_width_mm, field.min_font_size]
        .into_iter()
        .flatten()
        .all(f32::is_finite);
    if !finite {
        return Err(GenerationError::Config(format!(
            "Field '{}' has a non-finite position or size",
            field.id
        )));
    }
    Ok(())
}

impl fmt::Debug for GenerationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationJob")
            .field("rows", &self.rows.len())
            .field("fields", &self.fields.len())
            .field("template", &self.template.describe())
            .field("mode", &self.mode)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Serialized documents, in row order
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub buffers: Vec<Vec<u8>>,
    /// Number of rows rendered
    pub total: usize,
}

/// The batch orchestrator.
///
/// Cheap to clone; clones share the resource caches.
#[derive(Clone)]
pub struct Generator {
    resources: Arc<ResourceCache>,
    font_source: Arc<dyn FontSource>,
    shaper: Arc<dyn TextShaper>,
    options: GenerationOptions,
}

impl Generator {
    pub fn new(font_source: Arc<dyn FontSource>, options: GenerationOptions) -> Self {
        let shaper = Arc::new(ShapingPipeline::new(options.shaping));
        Self {
            resources: Arc::new(ResourceCache::new()),
            font_source,
            shaper,
            options,
        }
    }

    /// Share caches with other generators
    pub fn with_resources(mut self, resources: Arc<ResourceCache>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_shaper(mut self, shaper: Arc<dyn TextShaper>) -> Self {
        self.shaper = shaper;
        self
    }

    pub fn resources(&self) -> &Arc<ResourceCache> {
        &self.resources
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Run a job to completion on the current thread.
    ///
    /// On cancellation or failure no buffers are returned, including those
    /// of rows that had already finished.
    pub fn generate(
        &self,
        job: &GenerationJob,
        progress: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<GenerationOutput> {
        self.options.validate()?;
        job.validate(self.options.max_rows)?;

        let started = Instant::now();
        let template = self.resources.templates.load(job.template.as_ref())?;
        // Decode now so a corrupt image fails before the first row
        template.planes()?;

        let page = job
            .page_size
            .unwrap_or_else(|| PageSize::for_template(template.width, template.height));
        page.validate()?;

        let typeface = self.resources.fonts.get_or_load(self.font_source.as_ref())?;
        let font = Arc::new(FontPayload::prepare(typeface.clone())?);

        let spec = PageSpec {
            page,
            template_width: template.width,
            template_height: template.height,
            placement: self.options.placement,
            min_font_size: self.options.min_font_size,
        };
        let mut memo = ShapeMemo::new(self.shaper.clone());
        let total = job.rows.len();

        log::info!(
            "Generating {total} certificate(s) in {} mode on {:.0}x{:.0}mm",
            job.mode,
            page.width_mm,
            page.height_mm
        );

        let buffers = match job.mode {
            OutputMode::Single => {
                let mut builder = DocumentBuilder::new(font, &template, &self.options.title)?;
                for (index, row) in job.rows.iter().enumerate() {
                    check_cancelled(cancel, index)?;
                    draw_row(&mut builder, &spec, row, &job.fields, &mut memo, &typeface)
                        .map_err(|e| row_failure(index, e))?;
                    self.after_row(index, total, progress);
                }
                vec![builder.finish()?]
            }
            OutputMode::PerRow => {
                let mut buffers = Vec::with_capacity(total);
                for (index, row) in job.rows.iter().enumerate() {
                    check_cancelled(cancel, index)?;
                    let buffer = DocumentBuilder::new(font.clone(), &template, &self.options.title)
                        .and_then(|mut builder| {
                            draw_row(&mut builder, &spec, row, &job.fields, &mut memo, &typeface)?;
                            builder.finish()
                        })
                        .map_err(|e| row_failure(index, e))?;
                    buffers.push(buffer);
                    self.after_row(index, total, progress);
                }
                buffers
            }
        };

        log::info!(
            "Generated {} document(s) for {total} row(s) in {:.2?} ({} distinct strings shaped)",
            buffers.len(),
            started.elapsed(),
            memo.len()
        );
        Ok(GenerationOutput { buffers, total })
    }

    /// Run a job on the blocking thread pool.
    pub async fn generate_async<P>(
        &self,
        job: GenerationJob,
        progress: P,
        cancel: CancelFlag,
    ) -> Result<GenerationOutput>
    where
        P: ProgressSink + Send + 'static,
    {
        let generator = self.clone();
        tokio::task::spawn_blocking(move || generator.generate(&job, &progress, &cancel)).await?
    }

    fn after_row(&self, index: usize, total: usize, progress: &dyn ProgressSink) {
        let done = index + 1;
        if done % self.options.progress_interval == 0 || done == total {
            log::debug!("Progress {done}/{total}");
            progress.on_progress(Progress { done, total });
        }
        if done % self.options.yield_interval == 0 && done < total {
            log::trace!("Yielding after row {done}");
            std::thread::yield_now();
        }
    }
}

fn draw_row(
    builder: &mut DocumentBuilder,
    spec: &PageSpec,
    row: &Row,
    fields: &[Field],
    memo: &mut ShapeMemo,
    typeface: &Typeface,
) -> Result<()> {
    let mut canvas = builder.begin_page(spec.page);
    render_page(&mut canvas, spec, row, fields, memo, typeface)?;
    canvas.finish();
    Ok(())
}

fn check_cancelled(cancel: &CancelFlag, index: usize) -> Result<()> {
    if cancel.is_cancelled() {
        log::info!("Generation cancelled before row {}", index + 1);
        return Err(GenerationError::Cancelled);
    }
    Ok(())
}

fn row_failure(index: usize, err: GenerationError) -> GenerationError {
    GenerationError::RowRender {
        row: index + 1,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::row;
    use crate::fixtures;
    use crate::font::FontBytes;
    use crate::template::TemplateBytes;
    use std::sync::Mutex;

    fn generator() -> Generator {
        Generator::new(
            Arc::new(FontBytes(fixtures::font().into())),
            GenerationOptions::default(),
        )
    }

    fn job(rows: usize, mode: OutputMode) -> GenerationJob {
        let rows = (0..rows).map(|i| row([("name", format!("Person {i}"))])).collect();
        GenerationJob::new(
            rows,
            vec![Field::bound("n", "name").at(105.0, 100.0)],
            Arc::new(TemplateBytes::new(fixtures::template_png(21, 29), 1)),
            mode,
        )
    }

    #[test]
    fn test_progress_cadence() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: Progress| seen.lock().unwrap().push(p.done);

        generator()
            .generate(&job(12, OutputMode::Single), &sink, &CancelFlag::new())
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![5, 10, 12]);
    }

    #[test]
    fn test_progress_on_exact_multiple() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: Progress| seen.lock().unwrap().push((p.done, p.total));
        generator()
            .generate(&job(5, OutputMode::PerRow), &sink, &CancelFlag::new())
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(5, 5)]);
    }

    #[test]
    fn test_cancel_before_first_row() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = generator()
            .generate(&job(3, OutputMode::PerRow), &NoProgress, &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_cancel_mid_job_discards_finished_rows() {
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        // Cancel once the first progress notification arrives (after row 5)
        let sink = move |p: Progress| {
            if p.done == 5 {
                trigger.cancel();
            }
        };
        let result = generator().generate(&job(12, OutputMode::PerRow), &sink, &cancel);
        assert!(matches!(result, Err(GenerationError::Cancelled)));
    }

    #[test]
    fn test_empty_and_oversized_datasets() {
        let g = generator();
        let err = g
            .generate(&job(0, OutputMode::Single), &NoProgress, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyDataset));

        let small = Generator::new(
            Arc::new(FontBytes(fixtures::font().into())),
            GenerationOptions {
                max_rows: 2,
                ..Default::default()
            },
        );
        let err = small
            .generate(&job(3, OutputMode::Single), &NoProgress, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));
    }

    #[test]
    fn test_absurd_font_sizes_rejected() {
        for size in [1e8, f32::INFINITY, f32::NAN, 0.0, -4.0] {
            let mut j = job(1, OutputMode::Single);
            j.fields[0].font_size = size;
            j.fields[0].max_width_mm = Some(50.0);
            let err = generator()
                .generate(&j, &NoProgress, &CancelFlag::new())
                .unwrap_err();
            assert!(matches!(err, GenerationError::Config(_)), "{size}: {err}");
        }

        let mut j = job(1, OutputMode::Single);
        j.fields[0].max_width_mm = Some(f32::NAN);
        assert!(j.validate(10).is_err());
        j.fields[0].max_width_mm = Some(50.0);
        j.fields[0].font_size = MAX_FONT_SIZE;
        assert!(j.validate(10).is_ok());
    }

    #[test]
    fn test_missing_font_is_fatal() {
        struct NoFont;
        impl FontSource for NoFont {
            fn describe(&self) -> String {
                "nowhere".into()
            }
            fn fetch(&self) -> std::io::Result<Vec<u8>> {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "offline"))
            }
        }

        let g = Generator::new(Arc::new(NoFont), GenerationOptions::default());
        let err = g
            .generate(&job(2, OutputMode::PerRow), &NoProgress, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, GenerationError::ResourceLoad(_)));
    }

    #[test]
    fn test_cancel_flag_reset() {
        let flag = CancelFlag::new();
        flag.cancel();
        assert!(flag.clone().is_cancelled());
        flag.reset();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_output_mode_json() {
        let mode: OutputMode = serde_json::from_str("\"per-row\"").unwrap();
        assert_eq!(mode, OutputMode::PerRow);
        assert_eq!(OutputMode::Single.to_string(), "single");
    }
}
