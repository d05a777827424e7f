pub mod answer;
pub mod deepgram;
pub mod response;
pub mod scoring;
pub mod status;
pub mod submission;
pub mod work_unit;

pub use answer::*;
pub use deepgram::*;
pub use response::*;
pub use scoring::*;
pub use status::*;
pub use submission::*;
pub use work_unit::*;
