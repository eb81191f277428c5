//! Directory emulation over a flat, paginated key namespace.

use std::collections::HashSet;

use tracing::{debug, error};

use crate::{
    adapters::ObjectClient,
    model::{
        fs::FSError,
        object::{FSObject, ListRequest},
    },
};

/// Largest page the service hands out for one list call.
pub const MAX_KEYS: usize = 1000;

const LIST_DELIMITER: &str = "/";

#[derive(Debug, Default)]
pub struct DirectoryListing {
    pub objects: Vec<FSObject>,
    pub prefixes: Vec<String>,
}

pub struct DirectoryLister<'a> {
    client: &'a dyn ObjectClient,
    bucket: &'a str,
    page_size: usize,
}

impl<'a> DirectoryLister<'a> {
    pub fn new(client: &'a dyn ObjectClient, bucket: &'a str) -> Self {
        Self {
            client,
            bucket,
            page_size: MAX_KEYS,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_KEYS);
        self
    }

    /// Lists every object under `prefix`. With `recursive`, each common prefix
    /// is expanded depth-first once its parent level is fully paginated.
    ///
    /// Any client failure aborts the listing.
    pub fn list(&self, prefix: &str, recursive: bool) -> Result<DirectoryListing, FSError> {
        let mut listing = DirectoryListing::default();
        let mut seen_prefixes = HashSet::new();
        let mut pending = vec![prefix.to_string()];

        while let Some(current) = pending.pop() {
            let level = self.list_level(&current)?;

            listing.objects.extend(level.objects);

            let mut children = Vec::new();
            for p in level.prefixes {
                if seen_prefixes.insert(p.clone()) {
                    listing.prefixes.push(p.clone());
                    children.push(p);
                }
            }

            if recursive {
                pending.extend(children.into_iter().rev());
            }
        }

        Ok(listing)
    }

    fn list_level(&self, prefix: &str) -> Result<DirectoryListing, FSError> {
        let mut level = DirectoryListing::default();
        let mut marker: Option<String> = None;

        loop {
            let req = ListRequest {
                prefix,
                delimiter: LIST_DELIMITER,
                max_keys: self.page_size,
                marker: marker.as_deref(),
            };

            let page = self.client.list_objects(self.bucket, &req).map_err(|err| {
                error!(error_message=%err, error_group="list_objects", prefix=prefix);
                err
            })?;

            debug!(
                prefix = prefix,
                objects = page.objects.len(),
                prefixes = page.prefixes.len(),
                "listed page"
            );

            level.objects.extend(page.objects);
            level.prefixes.extend(page.prefixes);

            marker = page.next_marker.filter(|m| !m.is_empty());
            if marker.is_none() {
                break;
            }
        }

        Ok(level)
    }
}
