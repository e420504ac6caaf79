//! stepwise-core: question attempt step history, replay and views.
//!
//! A [`QuestionAttempt`] records every state transition of one learner's
//! attempt at one question as a [`Step`]. Pluggable [`Behaviour`]s decide
//! which submitted actions become steps, a [`UsageObserver`] is told about
//! every change, and [`RestrictedHistory`] shows the attempt as it was at
//! an earlier step.

pub mod attempt;
pub mod error;
pub mod marks;
pub mod mock;
pub mod records;
pub mod registry;
pub mod restricted;
pub mod sequence;
pub mod state;
pub mod step;
pub mod traits;
pub mod view;

pub use attempt::{AttemptId, BehaviourSpec, QuestionAttempt};
pub use error::{AttemptError, ManualMarkError, Result};
pub use records::{load_from_records, AttemptStepRecord, MissingQuestion, StepRecord};
pub use registry::BehaviourRegistry;
pub use restricted::RestrictedHistory;
pub use sequence::{StepIter, StepSequence, StepsWithSubmittedResponse};
pub use state::QuestionState;
pub use step::{
    ActionOptions, FileLoader, FileSaver, PendingStep, ResumeData, Step, StepId, StoredFile,
    SubmittedData, UserId, VarMap,
};
pub use traits::{
    Behaviour, ClassifiedResponse, ClassifiedResponses, CommentFormat, DisplayOptions,
    NullObserver, QuestionBank, QuestionDefinition, QuestionId, StepDecision, UsageObserver,
    WhichTries,
};
pub use view::AttemptView;
