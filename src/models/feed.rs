use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    #[default]
    Trending,
    Latest,
    Recommended,
}

impl FeedType {
    /// Value of the `type` query parameter. The backend calls the
    /// recommended feed `random`.
    pub fn wire_value(&self) -> &'static str {
        match self {
            FeedType::Trending => "trending",
            FeedType::Latest => "latest",
            FeedType::Recommended => "random",
        }
    }
}
