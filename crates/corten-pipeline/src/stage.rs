//! Pipeline stage progression.
//!
//! The stage order is a protocol commitment, not an implementation detail:
//! every inbound message walks `RECEIVED` through `BUSINESS_DISPATCHED` one
//! step at a time, or drops to `REJECTED` from wherever it failed. The
//! tracker makes skipping or walking backwards a typed error so that a
//! refactor cannot silently reorder the checks.

use crate::error::TransportError;

/// One stage of the incoming validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    HeaderExtracted,
    SecurityProcessed,
    AttachmentsResolved,
    StructureValidated,
    BusinessDispatched,
    Rejected,
}

impl PipelineStage {
    /// Position on the forward path; `None` for the rejection terminal.
    fn rank(self) -> Option<u8> {
        match self {
            PipelineStage::Received => Some(0),
            PipelineStage::HeaderExtracted => Some(1),
            PipelineStage::SecurityProcessed => Some(2),
            PipelineStage::AttachmentsResolved => Some(3),
            PipelineStage::StructureValidated => Some(4),
            PipelineStage::BusinessDispatched => Some(5),
            PipelineStage::Rejected => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStage::BusinessDispatched | PipelineStage::Rejected
        )
    }

    /// Stable name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Received => "RECEIVED",
            PipelineStage::HeaderExtracted => "HEADER_EXTRACTED",
            PipelineStage::SecurityProcessed => "SECURITY_PROCESSED",
            PipelineStage::AttachmentsResolved => "ATTACHMENTS_RESOLVED",
            PipelineStage::StructureValidated => "STRUCTURE_VALIDATED",
            PipelineStage::BusinessDispatched => "BUSINESS_DISPATCHED",
            PipelineStage::Rejected => "REJECTED",
        }
    }
}

/// Tracks one message's walk through the stages.
#[derive(Debug)]
pub struct StageTracker {
    stage: PipelineStage,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            stage: PipelineStage::Received,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Move to `next`. Allowed moves: one step forward on the ranked path,
    /// or to `Rejected` from any non-terminal stage.
    pub fn advance(&mut self, next: PipelineStage) -> Result<(), TransportError> {
        let allowed = if self.stage.is_terminal() {
            false
        } else if next == PipelineStage::Rejected {
            true
        } else {
            match (self.stage.rank(), next.rank()) {
                (Some(from), Some(to)) => to == from + 1,
                _ => false,
            }
        };
        if !allowed {
            return Err(TransportError::Stage {
                from: self.stage,
                to: next,
            });
        }
        tracing::debug!(from = self.stage.as_str(), to = next.as_str(), "stage");
        self.stage = next;
        Ok(())
    }
}
