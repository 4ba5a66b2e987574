//! Tree Mutator - nested-set renumbering plans
//!
//! Computes, for every structural change of the category forest, the ordered
//! list of row updates that keeps the nested-set invariants intact. The
//! mutator performs no I/O: a store reads the affected rows, asks for a plan,
//! and executes every step of it inside one transaction.
//!
//! # Operations
//!
//! - **Insert**: open a two-unit gap at the parent's right bound and place a
//!   leaf there (or start a new tree at `[1, 2]` for a root)
//! - **Move**: detach the subtree by negating its bounds, close the gap it
//!   leaves behind, open a gap of the same width at the destination, and
//!   reattach the subtree by flipping the sign back with an offset
//! - **Delete**: drop the subtree rows and close the gap
//!
//! Steps use strictly positive thresholds, so rows carrying the negative
//! "in flight" marker are never shifted while the subtree is detached.

use super::error::TreeOperationError;
use crate::models::{Category, CategoryId, Interval, PlacedCategory};

/// Which interval bound a shift applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Left,
    Right,
}

impl Bound {
    /// Column holding this bound in the `category` relation
    pub fn column(&self) -> &'static str {
        match self {
            Bound::Left => "\"left\"",
            Bound::Right => "\"right\"",
        }
    }

    fn of(&self, interval: &Interval) -> i64 {
        match self {
            Bound::Left => interval.left,
            Bound::Right => interval.right,
        }
    }

    fn of_mut<'a>(&self, interval: &'a mut Interval) -> &'a mut i64 {
        match self {
            Bound::Left => &mut interval.left,
            Bound::Right => &mut interval.right,
        }
    }
}

/// Row selection for a shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Bound strictly greater than the value
    Above(i64),
    /// Bound greater than or equal to the value
    AtLeast(i64),
}

impl Threshold {
    pub fn matches(&self, bound: i64) -> bool {
        match *self {
            Threshold::Above(value) => bound > value,
            Threshold::AtLeast(value) => bound >= value,
        }
    }

    /// SQL comparison operator and operand
    pub fn sql(&self) -> (&'static str, i64) {
        match *self {
            Threshold::Above(value) => (">", value),
            Threshold::AtLeast(value) => (">=", value),
        }
    }
}

/// One row update of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeStep {
    /// Add `delta` to `bound` of every row of `root_id` selected by `threshold`
    Shift {
        root_id: CategoryId,
        bound: Bound,
        threshold: Threshold,
        delta: i64,
    },
    /// Store a new row
    Insert {
        category: Category,
        interval: Interval,
    },
    /// Overwrite name, description and icon of a row
    UpdateFields { category: Category },
    /// Negate the bounds of every row inside `[left, right]` and move it to `into_root`
    Detach {
        root_id: CategoryId,
        left: i64,
        right: i64,
        into_root: CategoryId,
    },
    /// Flip negated rows of `root_id` back, translated by `offset`
    Reattach { root_id: CategoryId, offset: i64 },
    /// Point a row at its new parent
    Reparent {
        id: CategoryId,
        parent_id: CategoryId,
    },
    /// Delete every row inside `[left, right]`
    DeleteRange {
        root_id: CategoryId,
        left: i64,
        right: i64,
    },
}

impl TreeStep {
    /// Apply the step to an in-memory row set, returning the number of rows affected
    pub fn apply_to(&self, rows: &mut Vec<PlacedCategory>) -> u64 {
        let mut affected = 0;
        match self {
            TreeStep::Shift {
                root_id,
                bound,
                threshold,
                delta,
            } => {
                for row in rows.iter_mut() {
                    if row.interval.root_id == *root_id && threshold.matches(bound.of(&row.interval)) {
                        *bound.of_mut(&mut row.interval) += delta;
                        affected += 1;
                    }
                }
            }
            TreeStep::Insert { category, interval } => {
                rows.push(PlacedCategory::new(category.clone(), *interval));
                affected = 1;
            }
            TreeStep::UpdateFields { category } => {
                for row in rows.iter_mut().filter(|row| row.id() == category.id) {
                    row.category.name = category.name.clone();
                    row.category.description = category.description.clone();
                    row.category.icon = category.icon.clone();
                    affected += 1;
                }
            }
            TreeStep::Detach {
                root_id,
                left,
                right,
                into_root,
            } => {
                for row in rows.iter_mut() {
                    let interval = &mut row.interval;
                    if interval.root_id == *root_id
                        && interval.left >= *left
                        && interval.right <= *right
                    {
                        interval.left = -interval.left;
                        interval.right = -interval.right;
                        interval.root_id = *into_root;
                        affected += 1;
                    }
                }
            }
            TreeStep::Reattach { root_id, offset } => {
                for row in rows.iter_mut() {
                    let interval = &mut row.interval;
                    if interval.root_id == *root_id && interval.left < 0 {
                        interval.left = -interval.left + offset;
                        interval.right = -interval.right + offset;
                        affected += 1;
                    }
                }
            }
            TreeStep::Reparent { id, parent_id } => {
                for row in rows.iter_mut().filter(|row| row.id() == *id) {
                    row.category.parent_id = *parent_id;
                    affected += 1;
                }
            }
            TreeStep::DeleteRange {
                root_id,
                left,
                right,
            } => {
                let before = rows.len();
                rows.retain(|row| {
                    let interval = &row.interval;
                    !(interval.root_id == *root_id
                        && interval.left >= *left
                        && interval.right <= *right)
                });
                affected = (before - rows.len()) as u64;
            }
        }
        affected
    }
}

/// What a save turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// A new root tree was started
    CreatedRoot,
    /// A new category was inserted under an existing parent
    Created,
    /// Only non-structural fields changed
    Updated,
    /// The category (and its subtree) moved under another parent
    Moved,
}

/// Ordered row updates that together perform one mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePlan {
    pub steps: Vec<TreeStep>,
    /// Every `root_id` whose rows the plan touches, ascending and unique
    pub roots: Vec<CategoryId>,
}

impl TreePlan {
    fn new(steps: Vec<TreeStep>, roots: impl IntoIterator<Item = CategoryId>) -> Self {
        let mut roots: Vec<CategoryId> = roots.into_iter().collect();
        roots.sort_unstable();
        roots.dedup();
        Self { steps, roots }
    }

    /// True when no interval changes (field update only)
    pub fn is_structural(&self) -> bool {
        self.steps
            .iter()
            .any(|step| !matches!(step, TreeStep::UpdateFields { .. }))
    }
}

/// Plans nested-set mutations
pub struct TreeMutator;

impl TreeMutator {
    /// Start a brand-new tree with `category` as its root
    pub fn plan_insert_root(category: &Category) -> Result<TreePlan, TreeOperationError> {
        Self::check_category(category)?;
        if !category.is_root() {
            return Err(TreeOperationError::ParentNotFound {
                id: category.id,
                parent_id: category.parent_id,
            });
        }
        Ok(TreePlan::new(
            vec![TreeStep::Insert {
                category: category.clone(),
                interval: Interval::root(category.id),
            }],
            [category.id],
        ))
    }

    /// Insert `category` as the last child of `parent`
    pub fn plan_insert(
        category: &Category,
        parent: &PlacedCategory,
    ) -> Result<TreePlan, TreeOperationError> {
        Self::check_category(category)?;
        if category.parent_id != parent.id() {
            return Err(TreeOperationError::ParentNotFound {
                id: category.id,
                parent_id: category.parent_id,
            });
        }

        let root_id = parent.interval.root_id;
        let boundary = parent.interval.right;
        Ok(TreePlan::new(
            vec![
                TreeStep::Shift {
                    root_id,
                    bound: Bound::Right,
                    threshold: Threshold::AtLeast(boundary),
                    delta: 2,
                },
                TreeStep::Shift {
                    root_id,
                    bound: Bound::Left,
                    threshold: Threshold::Above(boundary),
                    delta: 2,
                },
                TreeStep::Insert {
                    category: category.clone(),
                    interval: Interval::leaf(boundary, root_id),
                },
            ],
            [root_id],
        ))
    }

    /// Move `node` and its whole subtree to become the last child of `new_parent`
    ///
    /// Rejects the move before producing any step when `new_parent` is the node
    /// itself or one of its descendants.
    pub fn plan_move(
        node: &PlacedCategory,
        new_parent: &PlacedCategory,
    ) -> Result<TreePlan, TreeOperationError> {
        if node.category.is_undefined() || new_parent.category.is_undefined() {
            return Err(TreeOperationError::SentinelImmutable);
        }
        if node.id() == new_parent.id() {
            return Err(TreeOperationError::SelfParent { id: node.id() });
        }
        if node.interval.is_ancestor_of(&new_parent.interval) {
            return Err(TreeOperationError::CircularReference {
                id: node.id(),
                parent_id: new_parent.id(),
            });
        }

        let source = node.interval;
        let old_root = source.root_id;
        let new_root = new_parent.interval.root_id;
        let width = source.width();

        // Destination captured before mutation; compaction pulls it left when it follows the subtree
        let mut destination = new_parent.interval.right;
        if new_root == old_root && destination > source.right {
            destination -= width;
        }

        let steps = vec![
            TreeStep::Detach {
                root_id: old_root,
                left: source.left,
                right: source.right,
                into_root: new_root,
            },
            TreeStep::Reparent {
                id: node.id(),
                parent_id: new_parent.id(),
            },
            TreeStep::Shift {
                root_id: old_root,
                bound: Bound::Left,
                threshold: Threshold::Above(source.left),
                delta: -width,
            },
            TreeStep::Shift {
                root_id: old_root,
                bound: Bound::Right,
                threshold: Threshold::Above(source.right),
                delta: -width,
            },
            TreeStep::Shift {
                root_id: new_root,
                bound: Bound::Left,
                threshold: Threshold::AtLeast(destination),
                delta: width,
            },
            TreeStep::Shift {
                root_id: new_root,
                bound: Bound::Right,
                threshold: Threshold::AtLeast(destination),
                delta: width,
            },
            TreeStep::Reattach {
                root_id: new_root,
                offset: destination - source.left,
            },
        ];
        Ok(TreePlan::new(steps, [old_root, new_root]))
    }

    /// Delete `node` together with its subtree and close the gap
    pub fn plan_delete(node: &PlacedCategory) -> Result<TreePlan, TreeOperationError> {
        if node.category.is_undefined() {
            return Err(TreeOperationError::SentinelImmutable);
        }
        let Interval {
            left,
            right,
            root_id,
        } = node.interval;
        let width = node.interval.width();
        Ok(TreePlan::new(
            vec![
                TreeStep::DeleteRange {
                    root_id,
                    left,
                    right,
                },
                TreeStep::Shift {
                    root_id,
                    bound: Bound::Left,
                    threshold: Threshold::Above(right),
                    delta: -width,
                },
                TreeStep::Shift {
                    root_id,
                    bound: Bound::Right,
                    threshold: Threshold::Above(right),
                    delta: -width,
                },
            ],
            [root_id],
        ))
    }

    /// Decide how a save of `category` is carried out
    ///
    /// `existing` is the stored row with the same id, `parent` the stored row
    /// named by `category.parent_id` (ignored for roots). Both must be read
    /// under the exclusion that will also cover the execution of the plan.
    pub fn plan_save(
        category: &Category,
        existing: Option<&PlacedCategory>,
        parent: Option<&PlacedCategory>,
    ) -> Result<(SaveKind, TreePlan), TreeOperationError> {
        Self::check_category(category)?;

        let Some(current) = existing else {
            if category.is_root() {
                return Ok((SaveKind::CreatedRoot, Self::plan_insert_root(category)?));
            }
            let parent = parent.ok_or(TreeOperationError::ParentNotFound {
                id: category.id,
                parent_id: category.parent_id,
            })?;
            return Ok((SaveKind::Created, Self::plan_insert(category, parent)?));
        };

        let update = TreeStep::UpdateFields {
            category: category.clone(),
        };
        if current.category.parent_id == category.parent_id {
            return Ok((
                SaveKind::Updated,
                TreePlan::new(vec![update], [current.interval.root_id]),
            ));
        }
        if category.is_root() {
            return Err(TreeOperationError::SelfParent { id: category.id });
        }

        let parent = parent.ok_or(TreeOperationError::ParentNotFound {
            id: category.id,
            parent_id: category.parent_id,
        })?;
        let mut plan = Self::plan_move(current, parent)?;
        plan.steps.push(update);
        Ok((SaveKind::Moved, plan))
    }

    fn check_category(category: &Category) -> Result<(), TreeOperationError> {
        if category.is_undefined() {
            return Err(TreeOperationError::SentinelImmutable);
        }
        category.validate()?;
        Ok(())
    }
}
