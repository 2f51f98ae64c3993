//! BSP tree node implementation.

use crate::arena::BufferId;
use crate::plane::Plane3D;

/// Index of an input solid within one boolean call.
pub type OperandId = usize;

/// Largest number of operands one call can combine.
pub const MAX_OPERANDS: usize = u64::BITS as usize;

/// A set of operand ids, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperandSet(u64);

impl OperandSet {
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub fn single(operand: OperandId) -> Self {
        debug_assert!(operand < MAX_OPERANDS);
        Self(1 << operand)
    }

    #[inline]
    pub fn contains(self, operand: OperandId) -> bool {
        operand < MAX_OPERANDS && self.0 & (1 << operand) != 0
    }

    #[inline]
    pub fn insert(&mut self, operand: OperandId) {
        *self = self.union(Self::single(operand));
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the members in increasing order.
    pub fn iter(self) -> impl Iterator<Item = OperandId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let next = bits.trailing_zeros() as OperandId;
            bits &= bits - 1;
            Some(next)
        })
    }
}

impl FromIterator<OperandId> for OperandSet {
    fn from_iter<I: IntoIterator<Item = OperandId>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for operand in iter {
            set.insert(operand);
        }
        set
    }
}

/// One side of a splitting plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
        }
    }
}

/// A polygon piece stored in the tree.
///
/// `plane` is the plane of the input polygon the piece was cut from, oriented
/// by that polygon's winding; it never changes as the piece is split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub operand: OperandId,
    /// The operand enters the call complemented.
    pub flip: bool,
    pub plane: Plane3D,
    pub vertices: BufferId,
}

impl Fragment {
    /// The same fragment with its vertices in another buffer.
    #[inline]
    pub fn with_vertices(self, vertices: BufferId) -> Self {
        Self { vertices, ..self }
    }
}

/// A node in the BSP tree.
///
/// Each node partitions space using a splitting plane and stores fragments
/// that are coplanar with that plane. Fragments on the front or back of the
/// plane are stored in the respective child subtrees.
///
/// # Coplanar Fragment Storage
///
/// Coplanar fragments are separated by their facing direction relative to
/// the splitting plane's normal:
/// - `coplanar_front`: fragments whose normal points the same direction as the plane normal
/// - `coplanar_back`: fragments whose normal points opposite to the plane normal
///
/// The facing decides on which side of the plane the owning operand's
/// interior lies.
#[derive(Debug, Clone)]
pub struct BspNode {
    /// Creation order within the tree, unique per tree.
    id: usize,

    /// The splitting plane for this node.
    plane: Plane3D,

    /// Fragments coplanar with the plane, facing the SAME direction as the plane normal.
    coplanar_front: Vec<Fragment>,

    /// Fragments coplanar with the plane, facing the OPPOSITE direction as the plane normal.
    coplanar_back: Vec<Fragment>,

    /// Subtree containing fragments in FRONT of the splitting plane.
    front: Option<Box<BspNode>>,

    /// Subtree containing fragments BEHIND the splitting plane.
    back: Option<Box<BspNode>>,

    /// Operands owning a fragment anywhere in this subtree.
    operands: OperandSet,
}

impl BspNode {
    /// Creates a node whose splitting plane is the fragment's own plane.
    pub fn from_fragment(id: usize, fragment: Fragment) -> Self {
        Self {
            id,
            plane: fragment.plane,
            operands: OperandSet::single(fragment.operand),
            coplanar_front: vec![fragment],
            coplanar_back: Vec::new(),
            front: None,
            back: None,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns a reference to the splitting plane.
    #[inline]
    pub fn plane(&self) -> &Plane3D {
        &self.plane
    }

    /// Returns coplanar fragments facing the same direction as the plane normal.
    #[inline]
    pub fn coplanar_front(&self) -> &[Fragment] {
        &self.coplanar_front
    }

    /// Returns coplanar fragments facing opposite to the plane normal.
    #[inline]
    pub fn coplanar_back(&self) -> &[Fragment] {
        &self.coplanar_back
    }

    /// Returns all coplanar fragments at this node (both front and back facing).
    pub fn all_coplanar(&self) -> impl Iterator<Item = &Fragment> {
        self.coplanar_front.iter().chain(self.coplanar_back.iter())
    }

    /// Returns the number of coplanar fragments at this node.
    pub fn coplanar_count(&self) -> usize {
        self.coplanar_front.len() + self.coplanar_back.len()
    }

    /// Whether `operand`'s fragment here faces along the plane normal.
    ///
    /// `None` if the operand has no fragment at this node.
    pub fn facing_of(&self, operand: OperandId) -> Option<bool> {
        if self.coplanar_front.iter().any(|f| f.operand == operand) {
            Some(true)
        } else if self.coplanar_back.iter().any(|f| f.operand == operand) {
            Some(false)
        } else {
            None
        }
    }

    /// Operands owning a fragment in this subtree, as of the last
    /// [`refresh_operands`](Self::refresh_operands).
    #[inline]
    pub fn operands(&self) -> OperandSet {
        self.operands
    }

    /// Returns a reference to the front child subtree.
    #[inline]
    pub fn front(&self) -> Option<&BspNode> {
        self.front.as_deref()
    }

    /// Returns a reference to the back child subtree.
    #[inline]
    pub fn back(&self) -> Option<&BspNode> {
        self.back.as_deref()
    }

    /// Returns the child on `side`.
    #[inline]
    pub fn child(&self, side: Side) -> Option<&BspNode> {
        match side {
            Side::Front => self.front(),
            Side::Back => self.back(),
        }
    }

    #[inline]
    pub(crate) fn child_slot_mut(&mut self, side: Side) -> &mut Option<Box<BspNode>> {
        match side {
            Side::Front => &mut self.front,
            Side::Back => &mut self.back,
        }
    }

    /// Stores a fragment that lies on this node's plane.
    pub fn add_coplanar(&mut self, fragment: Fragment) {
        self.operands.insert(fragment.operand);
        if fragment.plane.faces_same_direction(&self.plane) {
            self.coplanar_front.push(fragment);
        } else {
            self.coplanar_back.push(fragment);
        }
    }

    /// Recomputes the operand sets of this subtree bottom-up.
    pub fn refresh_operands(&mut self) -> OperandSet {
        let mut operands: OperandSet = self.all_coplanar().map(|f| f.operand).collect();
        if let Some(front) = self.front.as_deref_mut() {
            operands = operands.union(front.refresh_operands());
        }
        if let Some(back) = self.back.as_deref_mut() {
            operands = operands.union(back.refresh_operands());
        }
        self.operands = operands;
        operands
    }

    /// Checks if this node has any children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.front.is_none() && self.back.is_none()
    }

    /// Returns the total number of fragments in this subtree (including all descendants).
    pub fn fragment_count(&self) -> usize {
        let mut count = self.coplanar_count();

        if let Some(ref front) = self.front {
            count += front.fragment_count();
        }
        if let Some(ref back) = self.back {
            count += back.fragment_count();
        }

        count
    }

    /// Returns the number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.front.as_ref().map_or(0, |n| n.node_count())
            + self.back.as_ref().map_or(0, |n| n.node_count())
    }

    /// Returns the depth of this subtree (1 for a leaf node).
    pub fn depth(&self) -> usize {
        let front_depth = self.front.as_ref().map_or(0, |n| n.depth());
        let back_depth = self.back.as_ref().map_or(0, |n| n.depth());
        1 + front_depth.max(back_depth)
    }

    /// Hands every fragment buffer in this subtree to `f`, consuming it.
    pub(crate) fn drain_fragments(self, f: &mut impl FnMut(Fragment)) {
        let BspNode {
            coplanar_front,
            coplanar_back,
            front,
            back,
            ..
        } = self;
        coplanar_front.into_iter().chain(coplanar_back).for_each(&mut *f);
        if let Some(front) = front {
            (*front).drain_fragments(f);
        }
        if let Some(back) = back {
            (*back).drain_fragments(f);
        }
    }
}
