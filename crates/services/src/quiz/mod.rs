pub mod controller;
pub mod results;
pub mod workflow;

pub use controller::{AnswerOutcome, QuizController, QuizPhase, QuizProgress};
pub use results::{ResultsState, ResultsView, Route, resolve};
pub use workflow::{FinishReport, QuizLoopService, QuizStart, SubmitResult};
