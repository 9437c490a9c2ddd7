use strum_macros::Display;

use crate::api::UploadResponse;
use crate::error::UploadError;

/// A file picked by the user. Implemented over browser file handles in the
/// client and over plain structs in tests.
pub trait UploadFile: Clone {
    fn name(&self) -> String;
    fn size(&self) -> u64;
    fn mime_type(&self) -> String;

    fn is_image(&self) -> bool {
        self.mime_type().starts_with("image/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UploadStage {
    Empty,
    ImagesAdded,
    InstructionsProvided,
    SummaryShown,
    Uploading,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Editing,
    SummaryShown,
    Uploading,
    Done(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instructions<F> {
    Text(String),
    File(F),
}

/// Everything the upload request needs, captured when the upload starts.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload<F> {
    pub images: Vec<F>,
    pub instructions: Instructions<F>,
}

#[derive(Debug, Clone)]
pub struct UploadFlow<F: UploadFile> {
    images: Vec<F>,
    instruction_text: String,
    instruction_file: Option<F>,
    summary: Option<String>,
    phase: Phase,
    progress: u8,
}

impl<F: UploadFile> Default for UploadFlow<F> {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            instruction_text: String::new(),
            instruction_file: None,
            summary: None,
            phase: Phase::Editing,
            progress: 0,
        }
    }
}

impl<F: UploadFile> UploadFlow<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> UploadStage {
        match self.phase {
            Phase::Editing if self.images.is_empty() => UploadStage::Empty,
            Phase::Editing if self.has_instructions() => UploadStage::InstructionsProvided,
            Phase::Editing => UploadStage::ImagesAdded,
            Phase::SummaryShown => UploadStage::SummaryShown,
            Phase::Uploading => UploadStage::Uploading,
            Phase::Done(_) => UploadStage::Done,
        }
    }

    pub fn images(&self) -> &[F] {
        &self.images
    }

    pub fn instruction_text(&self) -> &str {
        &self.instruction_text
    }

    pub fn instruction_file(&self) -> Option<&F> {
        self.instruction_file.as_ref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn batch_id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Done(id) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn has_instructions(&self) -> bool {
        self.instruction_file.is_some() || !self.instruction_text.trim().is_empty()
    }

    fn ensure_editable(&mut self) -> Result<(), UploadError> {
        match self.phase {
            Phase::Uploading => return Err(UploadError::UploadInProgress),
            Phase::Done(_) => self.reset(),
            Phase::SummaryShown => {
                self.summary = None;
                self.phase = Phase::Editing;
            }
            Phase::Editing => {}
        }
        Ok(())
    }

    /// Appends files as given. Duplicates are kept.
    pub fn add_images(&mut self, files: impl IntoIterator<Item = F>) -> Result<usize, UploadError> {
        self.ensure_editable()?;
        let before = self.images.len();
        self.images.extend(files);
        Ok(self.images.len() - before)
    }

    pub fn remove_image(&mut self, index: usize) -> Result<Option<F>, UploadError> {
        self.ensure_editable()?;
        if index < self.images.len() {
            Ok(Some(self.images.remove(index)))
        } else {
            Ok(None)
        }
    }

    pub fn set_instruction_text(&mut self, text: String) -> Result<(), UploadError> {
        self.ensure_editable()?;
        self.instruction_text = text;
        Ok(())
    }

    pub fn set_instruction_file(&mut self, file: F) -> Result<(), UploadError> {
        self.ensure_editable()?;
        self.instruction_file = Some(file);
        Ok(())
    }

    pub fn clear_instruction_file(&mut self) -> Result<(), UploadError> {
        self.ensure_editable()?;
        self.instruction_file = None;
        Ok(())
    }

    /// Validates the inputs and produces the processing summary shown to the
    /// user before anything is sent.
    pub fn start_processing(&mut self) -> Result<&str, UploadError> {
        if matches!(self.phase, Phase::Uploading) {
            return Err(UploadError::UploadInProgress);
        }
        if self.images.is_empty() {
            return Err(UploadError::NoImages);
        }
        if !self.has_instructions() {
            return Err(UploadError::NoInstructions);
        }
        self.phase = Phase::SummaryShown;
        let summary = build_summary(
            &self.images,
            &self.instruction_text,
            self.instruction_file.as_ref(),
        );
        Ok(self.summary.insert(summary).as_str())
    }

    pub fn begin_upload(&mut self) -> Result<UploadPayload<F>, UploadError> {
        match self.phase {
            Phase::SummaryShown => {}
            Phase::Uploading => return Err(UploadError::UploadInProgress),
            _ => return Err(UploadError::SummaryNotShown),
        }
        let instructions = match &self.instruction_file {
            Some(file) => Instructions::File(file.clone()),
            None => Instructions::Text(self.instruction_text.trim().to_string()),
        };
        self.phase = Phase::Uploading;
        self.progress = 0;
        Ok(UploadPayload {
            images: self.images.clone(),
            instructions,
        })
    }

    /// Updates progress from bytes sent. Never moves backwards.
    pub fn record_progress(&mut self, sent: u64, total: u64) -> Result<u8, UploadError> {
        if self.phase != Phase::Uploading {
            return Err(UploadError::NotUploading);
        }
        let percent = if total == 0 {
            0
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        self.progress = self.progress.max(percent);
        Ok(self.progress)
    }

    pub fn complete(&mut self, response: &UploadResponse) -> Result<String, UploadError> {
        if self.phase != Phase::Uploading {
            return Err(UploadError::NotUploading);
        }
        self.progress = 100;
        self.phase = Phase::Done(response.batch_id.clone());
        Ok(response.batch_id.clone())
    }

    /// Upload failed: progress resets and the summary stays for another try.
    pub fn fail(&mut self) -> Result<(), UploadError> {
        if self.phase != Phase::Uploading {
            return Err(UploadError::NotUploading);
        }
        self.progress = 0;
        self.phase = Phase::SummaryShown;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn build_summary<F: UploadFile>(images: &[F], text: &str, file: Option<&F>) -> String {
    let count = images.len();
    let noun = if count == 1 { "image" } else { "images" };
    let total: u64 = images.iter().map(UploadFile::size).sum();
    let source = match file {
        Some(f) => format!("the instructions in \"{}\"", f.name()),
        None => format!("your instructions: \"{}\"", text.trim()),
    };
    format!(
        "I'll process {} {} ({}) following {}. Each result will appear on the processing page as soon as it is ready.",
        count,
        noun,
        format_size(total),
        source
    )
}
