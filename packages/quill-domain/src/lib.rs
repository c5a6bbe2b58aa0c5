pub mod hashtag;
pub mod id;
pub mod query;
