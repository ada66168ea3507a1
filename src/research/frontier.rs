use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlInfo {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
    pub depth: u32,
}

/// Unvisited URLs, best score first. Shallower entries win ties.
#[derive(Debug, Default)]
pub struct Frontier {
    items: Vec<UrlInfo>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or, for a known URL, keep whichever entry scores higher.
    pub fn push(&mut self, info: UrlInfo) {
        match self.items.iter_mut().find(|i| i.url == info.url) {
            Some(existing) if existing.score >= info.score => return,
            Some(existing) => *existing = info,
            None => self.items.push(info),
        }
        self.items.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.depth.cmp(&b.depth))
        });
    }

    pub fn extend(&mut self, infos: impl IntoIterator<Item = UrlInfo>) {
        for info in infos {
            self.push(info);
        }
    }

    pub fn pop(&mut self) -> Option<UrlInfo> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
