//! Checkout selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Cart, LineItem, LineItemKey};
use crate::types::Price;

/// Keys of the cart lines the shopper picked for checkout.
///
/// Independent of the cart contents: it only ever shrinks through
/// [`SelectionSet::evict`] (after a removal) or
/// [`SelectionSet::retain_present`] (after re-reading the cart), which keeps
/// it a subset of the cart's keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeSet<LineItemKey>);

impl SelectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select or deselect a line. Returns whether anything changed.
    pub fn toggle(&mut self, key: LineItemKey, checked: bool) -> bool {
        if checked {
            self.0.insert(key)
        } else {
            self.0.remove(&key)
        }
    }

    #[must_use]
    pub fn is_selected(&self, key: &LineItemKey) -> bool {
        self.0.contains(key)
    }

    /// Drop a key. Returns whether it was selected.
    pub fn evict(&mut self, key: &LineItemKey) -> bool {
        self.0.remove(key)
    }

    /// Drop every key that no longer addresses a line in `cart`.
    ///
    /// Returns the number of keys dropped.
    pub fn retain_present(&mut self, cart: &Cart) -> usize {
        let before = self.0.len();
        self.0.retain(|key| cart.contains(key));
        before - self.0.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineItemKey> {
        self.0.iter()
    }

    /// Selected lines, in cart order.
    #[must_use]
    pub fn selected_items<'a>(&self, cart: &'a Cart) -> Vec<&'a LineItem> {
        cart.items()
            .iter()
            .filter(|item| self.is_selected(&item.key()))
            .collect()
    }

    /// Sum of `unit_price * quantity` over the selected lines.
    #[must_use]
    pub fn selected_total(&self, cart: &Cart) -> Price {
        cart.items()
            .iter()
            .filter(|item| self.is_selected(&item.key()))
            .map(LineItem::line_total)
            .sum()
    }
}

impl FromIterator<LineItemKey> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = LineItemKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::test_support::item;
    use crate::types::ProductId;

    fn pesos(amount: i64) -> Price {
        Price::new(Decimal::from(amount))
    }

    #[test]
    fn test_toggle_is_idempotent() {
        let key = LineItemKey::new(ProductId::new(1), Some("M"));
        let mut selection = SelectionSet::new();

        assert!(selection.toggle(key.clone(), true));
        assert!(!selection.toggle(key.clone(), true));
        assert_eq!(selection.len(), 1);

        assert!(selection.toggle(key.clone(), false));
        assert!(!selection.toggle(key, false));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_selected_total_counts_only_selected_lines() {
        let cart = Cart::new([item(1, Some("M"), 2, 1000), item(2, None, 3, 250)]);
        let mut selection = SelectionSet::new();
        assert_eq!(selection.selected_total(&cart), Price::ZERO);

        selection.toggle(cart.items()[0].key(), true);
        assert_eq!(selection.selected_total(&cart), pesos(2000));

        selection.toggle(cart.items()[1].key(), true);
        assert_eq!(selection.selected_total(&cart), pesos(2750));
    }

    #[test]
    fn test_unselected_lines_do_not_move_the_total() {
        let selected = item(1, Some("M"), 2, 1000);
        let selection: SelectionSet = [selected.key()].into_iter().collect();

        let small = Cart::new([selected.clone()]);
        let bigger = Cart::new([selected, item(9, Some("XL"), 5, 4000)]);
        assert_eq!(selection.selected_total(&small), selection.selected_total(&bigger));
    }

    #[test]
    fn test_selected_items_keep_cart_order() {
        let cart = Cart::new([
            item(3, None, 1, 10),
            item(1, None, 1, 10),
            item(2, None, 1, 10),
        ]);
        // Insert in a different order than the cart.
        let selection: SelectionSet = [cart.items()[2].key(), cart.items()[0].key()]
            .into_iter()
            .collect();

        let ids: Vec<i64> = selection
            .selected_items(&cart)
            .iter()
            .map(|i| i.product_id.as_i64())
            .collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_retain_present_prunes_stale_keys() {
        let cart = Cart::new([item(1, Some("M"), 1, 10)]);
        let mut selection: SelectionSet = [
            LineItemKey::new(ProductId::new(1), Some("M")),
            LineItemKey::new(ProductId::new(1), Some("L")),
        ]
        .into_iter()
        .collect();

        assert_eq!(selection.retain_present(&cart), 1);
        assert!(selection.iter().all(|k| cart.contains(k)));
    }
}
