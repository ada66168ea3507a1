use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(super) struct ReadUrlRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchRequest<'a> {
    pub query: &'a str,
}

/// The host sends links either as bare URLs or as anchors.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum RawLink {
    Url(String),
    Anchor {
        #[serde(alias = "href")]
        url: String,
        #[serde(default)]
        text: String,
    },
}

#[derive(Debug, Deserialize)]
pub(super) struct ReadUrlResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLink {
    pub url: String,
    #[serde(default)]
    pub text: String,
}

impl From<RawLink> for PageLink {
    fn from(raw: RawLink) -> Self {
        match raw {
            RawLink::Url(url) => PageLink {
                url,
                text: String::new(),
            },
            RawLink::Anchor { url, text } => PageLink { url, text },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub content: String,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(alias = "url")]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}
