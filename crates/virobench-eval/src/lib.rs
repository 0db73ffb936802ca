pub mod corpus;
pub mod harness;
pub mod question;
pub mod runner;

pub mod prelude {
    pub use crate::corpus::{
        few_shot_from_reader, load_few_shot, load_test_set, test_set_from_reader,
    };
    pub use crate::harness::{
        DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, Harness, SYSTEM_PROMPT, prepare_messages,
    };
    pub use crate::question::{LETTERS, Question, permute};
    pub use crate::runner::{EvalReport, EvalRunner, ItemResult, Verdict};
}
