pub mod audit;
pub mod corpus;
pub mod engagement;
pub mod index;
pub mod intent;
pub mod llm;
pub mod messenger;
pub mod ranker;
pub mod schedule;
