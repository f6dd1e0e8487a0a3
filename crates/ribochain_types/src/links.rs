//! The `Links` entry content: a batch of base/link/tag assertions or
//! retractions committed as a single entry.

use crate::hash::Hash;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkAction {
    Add,
    Del,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub base: Hash,
    pub link: Hash,
    pub tag: String,
    pub link_action: LinkAction,
}

/// The content of a `Links` entry: one or more link assertions, possibly
/// against different bases.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Links {
    pub links: Vec<Link>,
}

impl Links {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }

    /// Distinct bases referenced by this batch, in first-seen order, used
    /// by `commit` to emit one `LINK_REQUEST` per base regardless of how
    /// many links share it.
    pub fn distinct_bases(&self) -> Vec<Hash> {
        let mut seen = Vec::new();
        for link in &self.links {
            if !seen.contains(&link.base) {
                seen.push(link.base.clone());
            }
        }
        seen
    }

    pub fn for_base<'a>(&'a self, base: &'a Hash) -> impl Iterator<Item = &'a Link> {
        self.links.iter().filter(move |l| &l.base == base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(base: &str, to: &str, action: LinkAction) -> Link {
        Link {
            base: Hash::of(base.as_bytes()),
            link: Hash::of(to.as_bytes()),
            tag: "likes".into(),
            link_action: action,
        }
    }

    #[test]
    fn distinct_bases_deduplicates() {
        let links = Links::new(vec![
            link("h1", "h2", LinkAction::Add),
            link("h1", "h3", LinkAction::Add),
            link("h4", "h5", LinkAction::Add),
        ]);
        assert_eq!(links.distinct_bases().len(), 2);
    }
}
