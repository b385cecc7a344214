//! Cart mutation coordination.
//!
//! The coordinator wraps every mutating call to the [`CartStore`] with the
//! per-line loading state, keeps the selection consistent with removals, and
//! routes destructive changes through a single [`RemovalPrompt`].
//!
//! A second mutation for a line whose first mutation is still in flight is
//! rejected with [`CartError::MutationInFlight`] instead of racing it.

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use super::{CartError, LineItem, LineItemKey, LoadingSet, SelectionSet};
use crate::remote::RemoteError;
use crate::types::ProductId;

/// Cart operations of the commerce backend, bound to one shopper.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Set the quantity of a line.
    async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<(), RemoteError>;

    /// Remove a line.
    async fn remove_from_cart(
        &self,
        product_id: ProductId,
        size: Option<&str>,
    ) -> Result<(), RemoteError>;
}

/// Shopper's answer to "Remove item from cart?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

/// Asks the shopper to confirm removing a line.
///
/// Used by both the decrease-quantity control (at quantity 1) and the
/// explicit remove control.
#[async_trait]
pub trait RemovalPrompt: Send + Sync {
    async fn request_removal(&self, item: &LineItem) -> Confirmation;
}

/// What a coordinator call did to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// The line now has this quantity.
    QuantityUpdated(u32),
    /// The line was removed.
    Removed,
    /// The shopper declined the removal; nothing was sent.
    Cancelled,
}

/// Drives cart mutations for one shopper.
pub struct CartCoordinator<S> {
    store: S,
    loading: LoadingSet,
}

impl<S: CartStore> CartCoordinator<S> {
    /// Create a coordinator over `store`, sharing `loading` with every other
    /// coordinator of the same shopper.
    pub const fn new(store: S, loading: LoadingSet) -> Self {
        Self { store, loading }
    }

    /// Loading state shared with the views.
    pub const fn loading(&self) -> &LoadingSet {
        &self.loading
    }

    /// Set a line's quantity. The selection is left untouched.
    ///
    /// `size` goes to the store exactly as given; only the loading key is
    /// normalized.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] for a quantity of 0
    /// - [`CartError::MutationInFlight`] if the line is already being updated
    /// - [`CartError::Remote`] if the store call fails
    #[instrument(skip(self, size), fields(size = size.unwrap_or_default()))]
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let key = LineItemKey::new(product_id, size);
        let _loading = self.loading.try_begin(key.clone())?;

        self.store
            .update_quantity(product_id, quantity, size)
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Error updating quantity");
                CartError::from(e)
            })
    }

    /// Remove a line and drop it from the selection.
    ///
    /// The selection only changes when the store confirms the removal; the
    /// loading entry is released either way.
    ///
    /// # Errors
    ///
    /// - [`CartError::MutationInFlight`] if the line is already being updated
    /// - [`CartError::Remote`] if the store call fails
    #[instrument(skip(self, selection, size), fields(size = size.unwrap_or_default()))]
    pub async fn remove_item(
        &self,
        selection: &mut SelectionSet,
        product_id: ProductId,
        size: Option<&str>,
    ) -> Result<(), CartError> {
        let key = LineItemKey::new(product_id, size);
        let _loading = self.loading.try_begin(key.clone())?;

        match self.store.remove_from_cart(product_id, size).await {
            Ok(()) => {
                selection.evict(&key);
                debug!(key = %key, "Removed line from cart");
                Ok(())
            }
            Err(e) => {
                error!(key = %key, error = %e, "Error removing from cart");
                Err(e.into())
            }
        }
    }

    /// "+" control.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_quantity`].
    pub async fn increment(&self, item: &LineItem) -> Result<CartChange, CartError> {
        let quantity = item.quantity.saturating_add(1);
        self.update_quantity(item.product_id, quantity, item.size.as_deref())
            .await?;
        Ok(CartChange::QuantityUpdated(quantity))
    }

    /// "-" control.
    ///
    /// Above 1 this is a plain quantity update. At 1 it never removes the
    /// line without asking `prompt` first; a confirmation performs exactly
    /// one removal.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_quantity`] and [`Self::remove_item`].
    pub async fn decrement<P>(
        &self,
        item: &LineItem,
        selection: &mut SelectionSet,
        prompt: &P,
    ) -> Result<CartChange, CartError>
    where
        P: RemovalPrompt + ?Sized,
    {
        if item.quantity > 1 {
            let quantity = item.quantity - 1;
            self.update_quantity(item.product_id, quantity, item.size.as_deref())
                .await?;
            return Ok(CartChange::QuantityUpdated(quantity));
        }

        self.confirm_and_remove(item, selection, prompt).await
    }

    /// "×" control. Asks for the same confirmation as decrement-to-zero.
    ///
    /// # Errors
    ///
    /// Same as [`Self::remove_item`].
    pub async fn request_remove<P>(
        &self,
        item: &LineItem,
        selection: &mut SelectionSet,
        prompt: &P,
    ) -> Result<CartChange, CartError>
    where
        P: RemovalPrompt + ?Sized,
    {
        self.confirm_and_remove(item, selection, prompt).await
    }

    async fn confirm_and_remove<P>(
        &self,
        item: &LineItem,
        selection: &mut SelectionSet,
        prompt: &P,
    ) -> Result<CartChange, CartError>
    where
        P: RemovalPrompt + ?Sized,
    {
        let key = item.key();
        if self.loading.is_loading(&key) {
            return Err(CartError::MutationInFlight(key));
        }

        match prompt.request_removal(item).await {
            Confirmation::Confirmed => {
                self.remove_item(selection, item.product_id, item.size.as_deref())
                    .await?;
                Ok(CartChange::Removed)
            }
            Confirmation::Cancelled => {
                debug!(key = %key, "Removal cancelled");
                Ok(CartChange::Cancelled)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;
    use tokio::sync::Notify;

    use super::*;
    use crate::cart::Cart;
    use crate::cart::test_support::item;
    use crate::types::Price;

    /// In-memory cart backend that records every call.
    #[derive(Default)]
    struct FakeStore {
        lines: Mutex<Vec<LineItem>>,
        updates: AtomicUsize,
        removals: AtomicUsize,
        /// Size argument of every call, as received.
        sizes: Mutex<Vec<Option<String>>>,
        fail_with: Mutex<Option<RemoteError>>,
        /// When set, calls wait here until notified.
        gate: Option<Notify>,
    }

    impl FakeStore {
        fn with(lines: Vec<LineItem>) -> Self {
            Self {
                lines: Mutex::new(lines),
                ..Self::default()
            }
        }

        fn gated(lines: Vec<LineItem>) -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Self::with(lines)
            }
        }

        fn fail_next(&self, error: RemoteError) {
            *self.fail_with.lock().unwrap() = Some(error);
        }

        fn cart(&self) -> Cart {
            Cart::new(self.lines.lock().unwrap().clone())
        }

        async fn pass_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }

        fn failure(&self) -> Option<RemoteError> {
            self.fail_with.lock().unwrap().take()
        }
    }

    #[async_trait]
    impl CartStore for FakeStore {
        async fn update_quantity(
            &self,
            product_id: ProductId,
            quantity: u32,
            size: Option<&str>,
        ) -> Result<(), RemoteError> {
            self.pass_gate().await;
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.sizes.lock().unwrap().push(size.map(ToString::to_string));
            if let Some(error) = self.failure() {
                return Err(error);
            }
            let key = LineItemKey::new(product_id, size);
            for line in self.lines.lock().unwrap().iter_mut() {
                if line.key() == key {
                    line.quantity = quantity;
                }
            }
            Ok(())
        }

        async fn remove_from_cart(
            &self,
            product_id: ProductId,
            size: Option<&str>,
        ) -> Result<(), RemoteError> {
            self.pass_gate().await;
            self.removals.fetch_add(1, Ordering::SeqCst);
            self.sizes.lock().unwrap().push(size.map(ToString::to_string));
            if let Some(error) = self.failure() {
                return Err(error);
            }
            let key = LineItemKey::new(product_id, size);
            self.lines.lock().unwrap().retain(|line| line.key() != key);
            Ok(())
        }
    }

    /// Prompt with a fixed answer that counts how often it was asked.
    struct ScriptedPrompt {
        answer: Confirmation,
        asked: AtomicUsize,
    }

    impl ScriptedPrompt {
        const fn answering(answer: Confirmation) -> Self {
            Self {
                answer,
                asked: AtomicUsize::new(0),
            }
        }

        fn times_asked(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemovalPrompt for ScriptedPrompt {
        async fn request_removal(&self, _item: &LineItem) -> Confirmation {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn pesos(amount: i64) -> Price {
        Price::new(Decimal::from(amount))
    }

    #[tokio::test]
    async fn test_select_decrement_confirm_empties_cart() {
        let store = FakeStore::with(vec![item(1, Some("M"), 2, 1000)]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let mut selection = SelectionSet::new();

        let cart = coordinator.store.cart();
        selection.toggle(cart.items()[0].key(), true);
        assert_eq!(selection.selected_total(&cart), pesos(2000));

        // 2 -> 1 is a plain update.
        let prompt = ScriptedPrompt::answering(Confirmation::Confirmed);
        let change = coordinator
            .decrement(&cart.items()[0], &mut selection, &prompt)
            .await
            .unwrap();
        assert_eq!(change, CartChange::QuantityUpdated(1));
        assert_eq!(prompt.times_asked(), 0);

        // 1 -> 0 asks first, then removes exactly once.
        let cart = coordinator.store.cart();
        let change = coordinator
            .decrement(&cart.items()[0], &mut selection, &prompt)
            .await
            .unwrap();
        assert_eq!(change, CartChange::Removed);
        assert_eq!(prompt.times_asked(), 1);
        assert_eq!(coordinator.store.removals.load(Ordering::SeqCst), 1);

        assert!(coordinator.store.cart().is_empty());
        assert!(selection.is_empty());
        assert!(coordinator.loading().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_decrement_sends_nothing() {
        let store = FakeStore::with(vec![item(1, None, 1, 500)]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let line = coordinator.store.cart().items()[0].clone();
        let mut selection: SelectionSet = [line.key()].into_iter().collect();

        let prompt = ScriptedPrompt::answering(Confirmation::Cancelled);
        let change = coordinator
            .decrement(&line, &mut selection, &prompt)
            .await
            .unwrap();

        assert_eq!(change, CartChange::Cancelled);
        assert_eq!(prompt.times_asked(), 1);
        assert_eq!(coordinator.store.removals.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.store.updates.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.store.cart().len(), 1);
        assert!(selection.is_selected(&line.key()));
    }

    #[tokio::test]
    async fn test_explicit_remove_uses_same_prompt() {
        let store = FakeStore::with(vec![item(1, Some("M"), 3, 100)]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let line = coordinator.store.cart().items()[0].clone();
        let mut selection: SelectionSet = [line.key()].into_iter().collect();

        let prompt = ScriptedPrompt::answering(Confirmation::Confirmed);
        let change = coordinator
            .request_remove(&line, &mut selection, &prompt)
            .await
            .unwrap();

        assert_eq!(change, CartChange::Removed);
        assert_eq!(prompt.times_asked(), 1);
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_selection() {
        let store = FakeStore::with(vec![item(1, Some("M"), 1, 100)]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let line = coordinator.store.cart().items()[0].clone();
        let selection: SelectionSet = [line.key()].into_iter().collect();

        let change = coordinator.increment(&line).await.unwrap();
        assert_eq!(change, CartChange::QuantityUpdated(2));
        assert!(selection.is_selected(&line.key()));
        assert_eq!(coordinator.store.cart().items()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_store_receives_size_as_the_backend_sent_it() {
        let store = FakeStore::with(vec![
            item(1, Some(" M "), 2, 100),
            item(2, Some("no-size"), 1, 100),
        ]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let cart = coordinator.store.cart();
        let mut selection: SelectionSet = cart.items().iter().map(LineItem::key).collect();

        coordinator.increment(&cart.items()[0]).await.unwrap();
        let prompt = ScriptedPrompt::answering(Confirmation::Confirmed);
        coordinator
            .request_remove(&cart.items()[1], &mut selection, &prompt)
            .await
            .unwrap();

        assert_eq!(
            *coordinator.store.sizes.lock().unwrap(),
            vec![Some(" M ".to_string()), Some("no-size".to_string())]
        );
        assert!(!selection.is_selected(&cart.items()[1].key()));
        assert!(coordinator.loading().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quantity_update_is_rejected() {
        let coordinator = CartCoordinator::new(FakeStore::default(), LoadingSet::new());
        let err = coordinator
            .update_quantity(ProductId::new(1), 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity));
        assert_eq!(coordinator.store.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_update_clears_loading() {
        let store = FakeStore::with(vec![item(1, Some("M"), 2, 100)]);
        store.fail_next(RemoteError::Network("connection reset".into()));
        let coordinator = CartCoordinator::new(store, LoadingSet::new());

        let err = coordinator
            .update_quantity(ProductId::new(1), 5, Some("M"))
            .await
            .unwrap_err();

        assert!(matches!(err, CartError::Remote(RemoteError::Network(_))));
        assert!(coordinator.loading().is_empty());
        assert_eq!(coordinator.store.cart().items()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_failed_removal_keeps_selection_and_clears_loading() {
        let store = FakeStore::with(vec![item(1, Some("M"), 1, 100)]);
        store.fail_next(RemoteError::rejected(500, "database unavailable"));
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let line = coordinator.store.cart().items()[0].clone();
        let mut selection: SelectionSet = [line.key()].into_iter().collect();

        let err = coordinator
            .remove_item(&mut selection, line.product_id, line.size.as_deref())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "database unavailable");
        assert!(selection.is_selected(&line.key()));
        assert!(coordinator.loading().is_empty());
        assert_eq!(coordinator.store.cart().len(), 1);
    }

    #[tokio::test]
    async fn test_same_key_mutation_is_rejected_while_pending() {
        let store = FakeStore::gated(vec![item(1, Some("M"), 1, 100)]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let key = LineItemKey::new(ProductId::new(1), Some("M"));

        let first = coordinator.update_quantity(ProductId::new(1), 2, Some("M"));
        let second = async {
            // Runs once `first` has parked on the gate holding the key.
            tokio::task::yield_now().await;
            assert!(coordinator.loading().is_loading(&key));
            let result = coordinator
                .update_quantity(ProductId::new(1), 3, Some("M"))
                .await;
            if let Some(gate) = &coordinator.store.gate {
                gate.notify_one();
            }
            result
        };

        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        assert!(matches!(second, Err(CartError::MutationInFlight(k)) if k == key));
        assert_eq!(coordinator.store.updates.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.store.cart().items()[0].quantity, 2);
        assert!(coordinator.loading().is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_are_not_blocked() {
        let store = FakeStore::with(vec![item(1, Some("M"), 1, 100), item(2, None, 1, 100)]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let held = coordinator
            .loading()
            .try_begin(LineItemKey::new(ProductId::new(1), Some("M")))
            .unwrap();

        coordinator
            .update_quantity(ProductId::new(2), 2, None)
            .await
            .unwrap();
        assert_eq!(coordinator.store.cart().items()[1].quantity, 2);

        let err = coordinator
            .update_quantity(ProductId::new(1), 2, Some("M"))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::MutationInFlight(_)));

        drop(held);
        assert!(coordinator.loading().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_not_shown_while_line_is_loading() {
        let store = FakeStore::with(vec![item(1, None, 1, 100)]);
        let coordinator = CartCoordinator::new(store, LoadingSet::new());
        let line = coordinator.store.cart().items()[0].clone();
        let _held = coordinator.loading().try_begin(line.key()).unwrap();
        let mut selection = SelectionSet::new();

        let prompt = ScriptedPrompt::answering(Confirmation::Confirmed);
        let err = coordinator
            .request_remove(&line, &mut selection, &prompt)
            .await
            .unwrap_err();

        assert!(matches!(err, CartError::MutationInFlight(_)));
        assert_eq!(prompt.times_asked(), 0);
        assert_eq!(coordinator.store.removals.load(Ordering::SeqCst), 0);
    }
}
