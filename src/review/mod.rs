pub mod console;
pub mod gate;
pub mod types;

pub use console::{ConsoleReviewer, ReviewerTask};
pub use gate::{HeadEvent, ReviewGate};
pub use types::{PendingRequestData, ReviewOutcome};
