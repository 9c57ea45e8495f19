pub mod pack;
pub mod sample;
pub mod submission;
pub mod user;
pub mod window;

pub use pack::{PackPhase, PackWithSamples, SamplePack};
pub use sample::{NewSample, Sample};
pub use submission::{NewSubmission, Submission};
pub use user::User;
pub use window::{PackWindows, WindowSettings};
