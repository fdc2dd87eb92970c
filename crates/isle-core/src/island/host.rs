//! The object `hydrate` renders into.

use std::fmt;

/// A stand-in parent for one already-rendered DOM node.
///
/// The runtime believes it is rendering into a container whose only child is
/// the node. Any attempt to insert or append replaces that node in its real
/// parent instead, so hydration happens in place without a wrapper element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationHost<'a> {
    /// JS variable holding the node.
    node: &'a str,
    /// JS variable the replace function is bound to.
    replace: &'a str,
}

impl<'a> HydrationHost<'a> {
    #[must_use]
    pub fn new(node: &'a str, replace: &'a str) -> Self {
        Self { node, replace }
    }

    /// `let <replace>=(n)=>(<node>.parentNode.replaceChild(n,<node>),n);`
    #[must_use]
    pub fn replace_fn(&self) -> String {
        format!(
            "let {r}=(n)=>({e}.parentNode.replaceChild(n,{e}),n);",
            r = self.replace,
            e = self.node
        )
    }
}

/// Renders the capability object literal.
impl fmt::Display for HydrationHost<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{childNodes:[{e}],firstChild:{e},insertBefore:{r},appendChild:{r}}}",
            e = self.node,
            r = self.replace
        )
    }
}
