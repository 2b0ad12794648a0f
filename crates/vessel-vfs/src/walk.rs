//! Depth-first traversal over the implicit directory tree

use tracing::trace;
use vessel_core::CancelToken;

use crate::error::VfsResult;
use crate::vfs::{Vfs, normalize};

/// An entry handed to filters and visitors during [`Vfs::walk`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    /// Normalized path, empty for the root
    pub path: String,
    pub is_dir: bool,
    /// File size (0 for directories)
    pub size: u64,
    /// Distance from the walk root (the root itself is 0)
    pub depth: usize,
}

impl WalkEntry {
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Filter verdict. `Skip` on a directory prunes its whole subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkFilter {
    Visit,
    Skip,
}

/// What the visitor wants next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkAction {
    Continue,
    /// Do not descend into this directory (same as `Continue` for files).
    SkipDir,
    /// End the walk successfully.
    Stop,
}

type FilterFn<'a> = Box<dyn Fn(&WalkEntry) -> WalkFilter + 'a>;

/// Walk configuration.
///
/// `skip_errors` suppresses traversal errors (a missing root or an entry
/// that disappears mid-walk). Errors returned by the visitor itself always
/// propagate, as does cancellation.
#[derive(Default)]
pub struct WalkOptions<'a> {
    max_depth: Option<usize>,
    filter: Option<FilterFn<'a>>,
    skip_errors: bool,
    cancel: Option<CancelToken>,
}

impl<'a> WalkOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not visit entries deeper than `depth` below the root.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn filter(mut self, filter: impl Fn(&WalkEntry) -> WalkFilter + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn skip_errors(mut self, skip: bool) -> Self {
        self.skip_errors = skip;
        self
    }

    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

impl Vfs {
    /// Visit `root` and everything below it, depth first, children in
    /// name order.
    pub fn walk<F>(&self, root: &str, options: &WalkOptions<'_>, mut visitor: F) -> VfsResult<()>
    where
        F: FnMut(&WalkEntry) -> VfsResult<WalkAction>,
    {
        self.walk_inner(&normalize(root), 0, options, &mut visitor)
            .map(|_| ())
    }

    fn walk_inner<F>(
        &self,
        path: &str,
        depth: usize,
        options: &WalkOptions<'_>,
        visitor: &mut F,
    ) -> VfsResult<Flow>
    where
        F: FnMut(&WalkEntry) -> VfsResult<WalkAction>,
    {
        if let Some(cancel) = &options.cancel {
            cancel.check()?;
        }

        let entry = match self.stat(path) {
            Ok(meta) => WalkEntry {
                path: meta.path,
                is_dir: meta.is_dir,
                size: if meta.is_dir { 0 } else { meta.size },
                depth,
            },
            Err(e) if options.skip_errors => {
                trace!(path, error = %e, "skipping unreadable entry");
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e),
        };

        if let Some(filter) = &options.filter {
            if filter(&entry) == WalkFilter::Skip {
                return Ok(Flow::Continue);
            }
        }

        match visitor(&entry)? {
            WalkAction::Stop => return Ok(Flow::Stop),
            WalkAction::SkipDir => return Ok(Flow::Continue),
            WalkAction::Continue => {}
        }

        if !entry.is_dir || options.max_depth.is_some_and(|max| depth >= max) {
            return Ok(Flow::Continue);
        }

        let children = match self.read_dir(&entry.path) {
            Ok(children) => children,
            Err(e) if options.skip_errors => {
                trace!(path, error = %e, "skipping unreadable directory");
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e),
        };

        for child in children {
            let child_path = if entry.path.is_empty() {
                child.name
            } else {
                format!("{}/{}", entry.path, child.name)
            };
            if self.walk_inner(&child_path, depth + 1, options, visitor)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }
}
