//! Integration tests for the purchase request lifecycle.
//!
//! These tests drive the cart and the request service over the in-memory
//! stores and verify the inventory side effects of payment.

use common::{Money, ProductId, RequestId, RequestStatus, UserId};
use domain::{Cart, CartItem, DomainError, NewPurchaseRequest, PurchaseRequestService};
use storage::{
    InMemoryProductStore, InMemoryProfileDirectory, InMemoryPurchaseRequestRepository, LineItem,
    Page, Product, ProductStore, ProductType, Profile, PurchaseRequest, StockMovement, UserType,
};

type Service = PurchaseRequestService<
    InMemoryPurchaseRequestRepository,
    InMemoryProductStore,
    InMemoryProfileDirectory,
>;

struct Marketplace {
    service: Service,
    products: InMemoryProductStore,
    customer: UserId,
    farmer: UserId,
}

impl Marketplace {
    async fn new() -> Self {
        let customer = Profile::new(UserId::new(), "ada@mail.ng", UserType::Customer)
            .with_full_name("Ada Eze");
        let farmer = Profile::new(UserId::new(), "bayo@farm.ng", UserType::Farmer)
            .with_full_name("Bayo Ade")
            .with_address("Ogbomoso");
        let (customer_id, farmer_id) = (customer.user_id, farmer.user_id);
        let products = InMemoryProductStore::new();

        Self {
            service: PurchaseRequestService::new(
                InMemoryPurchaseRequestRepository::new(),
                products.clone(),
                InMemoryProfileDirectory::with_profiles([customer, farmer]),
            ),
            products,
            customer: customer_id,
            farmer: farmer_id,
        }
    }

    async fn list(&self, id: &str, price: i64, stock: u32) -> Product {
        let product = Product::new(
            id,
            self.farmer,
            format!("Product {id}"),
            "Grains",
            ProductType::Crop,
            Money::from_minor(price),
            stock,
        );
        self.products.insert(product.clone()).await.unwrap();
        product
    }

    async fn stock(&self, id: &str) -> Product {
        self.products
            .get(&ProductId::new(id))
            .await
            .unwrap()
            .unwrap()
    }

    fn new_request(&self, lines: &[(&str, u32, i64)]) -> NewPurchaseRequest {
        NewPurchaseRequest {
            customer_id: self.customer,
            farmer_id: self.farmer,
            items: lines
                .iter()
                .map(|(id, qty, price)| LineItem::new(*id, *qty, Money::from_minor(*price)))
                .collect(),
            message: None,
        }
    }

    async fn accepted_request(&self, lines: &[(&str, u32, i64)]) -> PurchaseRequest {
        let request = self
            .service
            .create(self.customer, self.new_request(lines))
            .await
            .unwrap();
        self.service.accept(self.farmer, request.id).await.unwrap()
    }
}

mod scenario {
    use super::*;

    #[tokio::test]
    async fn cart_to_paid_request() {
        let market = Marketplace::new().await;
        let p1 = market.list("P1", 1000, 10).await;
        let p2 = market.list("P2", 500, 1).await;

        let mut cart = Cart::new();
        cart.add_item(CartItem::from(&p1), 2).unwrap();
        cart.add_item(CartItem::from(&p2), 1).unwrap();
        assert_eq!(cart.total_price().minor(), 2500);
        assert_eq!(cart.total_item_count(), 3);

        let request = market
            .service
            .create(
                market.customer,
                cart.checkout(market.customer, Some("Weekend delivery".into()))
                    .unwrap(),
            )
            .await
            .unwrap();
        cart.clear();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.total_amount.minor(), 2500);
        assert_eq!(request.message.as_deref(), Some("Weekend delivery"));

        let accepted = market
            .service
            .accept(market.farmer, request.id)
            .await
            .unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);

        let paid = market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap();
        assert_eq!(paid.status, RequestStatus::Paid);

        assert_eq!(market.stock("P1").await.quantity, 8);
        let p2 = market.stock("P2").await;
        assert_eq!(p2.quantity, 0);
        assert!(!p2.is_active);
        let listed = market.products.list_active().await.unwrap();
        assert!(listed.iter().all(|p| p.id.as_str() != "P2"));

        let receipt = market
            .service
            .receipt(market.customer, request.id)
            .await
            .unwrap();
        assert_eq!(receipt.customer_name, "Ada Eze");
        assert_eq!(receipt.farmer_address, "Ogbomoso");
        assert_eq!(receipt.total.minor(), 2500);
    }
}

mod state_machine {
    use super::*;

    #[tokio::test]
    async fn pay_requires_accepted() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;

        let pending = market
            .service
            .create(market.customer, market.new_request(&[("P1", 1, 1000)]))
            .await
            .unwrap();
        let err = market
            .service
            .pay(market.customer, pending.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                current: RequestStatus::Pending,
                action: "pay"
            }
        ));

        market
            .service
            .reject(market.farmer, pending.id)
            .await
            .unwrap();
        let err = market
            .service
            .pay(market.customer, pending.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                current: RequestStatus::Rejected,
                ..
            }
        ));
        assert_eq!(market.stock("P1").await.quantity, 10);
    }

    #[tokio::test]
    async fn decisions_require_pending() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;
        let request = market.accepted_request(&[("P1", 1, 1000)]).await;

        for result in [
            market.service.accept(market.farmer, request.id).await,
            market.service.reject(market.farmer, request.id).await,
        ] {
            assert!(matches!(
                result,
                Err(DomainError::InvalidStateTransition {
                    current: RequestStatus::Accepted,
                    ..
                })
            ));
        }

        market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap();
        let err = market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                current: RequestStatus::Paid,
                ..
            }
        ));
        assert_eq!(market.stock("P1").await.quantity, 9);
    }

    #[tokio::test]
    async fn racing_decisions_have_one_winner() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;
        let request = market
            .service
            .create(market.customer, market.new_request(&[("P1", 1, 1000)]))
            .await
            .unwrap();

        let accept = tokio::spawn({
            let service = market.service.clone();
            let farmer = market.farmer;
            async move { service.accept(farmer, request.id).await }
        });
        let reject = tokio::spawn({
            let service = market.service.clone();
            let farmer = market.farmer;
            async move { service.reject(farmer, request.id).await }
        });
        let results = [accept.await.unwrap(), reject.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DomainError::InvalidStateTransition { .. })
        )));
    }
}

mod inventory {
    use super::*;

    #[tokio::test]
    async fn pay_decrements_and_deactivates() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 5).await;
        market.list("P2", 500, 1).await;
        let request = market
            .accepted_request(&[("P1", 2, 1000), ("P2", 1, 500)])
            .await;

        market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap();

        assert_eq!(market.stock("P1").await.quantity, 3);
        let p2 = market.stock("P2").await;
        assert_eq!(p2.quantity, 0);
        assert!(!p2.is_active);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_payments_for_last_unit() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 1).await;
        let first = market.accepted_request(&[("P1", 1, 1000)]).await;
        let second = market.accepted_request(&[("P1", 1, 1000)]).await;

        let handles = [first.id, second.id].map(|id| {
            let service = market.service.clone();
            let customer = market.customer;
            tokio::spawn(async move { service.pay(customer, id).await })
        });
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DomainError::InventoryUpdate { product_id, .. }) if product_id.as_str() == "P1"
        )));
        let p1 = market.stock("P1").await;
        assert_eq!(p1.quantity, 0);
        assert!(!p1.is_active);

        let loser = if results[0].is_ok() { second.id } else { first.id };
        let loser = market.service.get(market.customer, loser).await.unwrap();
        assert_eq!(loser.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn failed_line_rolls_back_and_retry_succeeds() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 5).await;
        market.list("P2", 500, 1).await;
        market.list("P3", 200, 4).await;
        let request = market
            .accepted_request(&[("P1", 2, 1000), ("P2", 1, 500), ("P3", 6, 200)])
            .await;

        let err = market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InventoryUpdate { ref product_id, .. } if product_id.as_str() == "P3"
        ));
        assert_eq!(market.stock("P1").await.quantity, 5);
        let p2 = market.stock("P2").await;
        assert_eq!(p2.quantity, 1);
        assert!(p2.is_active);
        let unchanged = market
            .service
            .get(market.customer, request.id)
            .await
            .unwrap();
        assert_eq!(unchanged.status, RequestStatus::Accepted);

        market
            .products
            .update_quantity(&ProductId::new("P3"), 10)
            .await
            .unwrap();
        let paid = market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap();
        assert_eq!(paid.status, RequestStatus::Paid);
        assert_eq!(market.stock("P1").await.quantity, 3);
        assert_eq!(market.stock("P3").await.quantity, 4);
    }

    #[tokio::test]
    async fn store_outage_rolls_back() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 5).await;
        market.list("P2", 500, 5).await;
        let request = market
            .accepted_request(&[("P1", 1, 1000), ("P2", 1, 500)])
            .await;
        market.products.fail_sales_for("P2").await;

        let err = market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::InventoryUpdate { .. }));
        assert_eq!(market.stock("P1").await.quantity, 5);
        assert_eq!(market.products.movement_count().await, 0);
    }

    #[tokio::test]
    async fn retry_after_interrupted_payment_decrements_once() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 5).await;
        market.list("P2", 500, 5).await;
        let request = market
            .accepted_request(&[("P1", 2, 1000), ("P2", 1, 500)])
            .await;

        // An earlier attempt applied the first line and never finished.
        market
            .products
            .apply_sale(&StockMovement::new(request.id, "P1", 2))
            .await
            .unwrap();

        market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap();

        assert_eq!(market.stock("P1").await.quantity, 3);
        assert_eq!(market.stock("P2").await.quantity, 4);
    }

    #[tokio::test]
    async fn failed_retry_keeps_lines_settled_earlier() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 5).await;
        market.list("P2", 500, 1).await;
        let request = market
            .accepted_request(&[("P1", 2, 1000), ("P2", 3, 500)])
            .await;

        // Another payer already settled the first line.
        market
            .products
            .apply_sale(&StockMovement::new(request.id, "P1", 2))
            .await
            .unwrap();

        let err = market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InventoryUpdate { .. }));
        assert_eq!(market.stock("P1").await.quantity, 3);
        assert_eq!(market.stock("P2").await.quantity, 1);
        assert_eq!(market.products.movement_count().await, 1);

        market
            .products
            .update_quantity(&ProductId::new("P2"), 3)
            .await
            .unwrap();
        let paid = market
            .service
            .pay(market.customer, request.id)
            .await
            .unwrap();
        assert_eq!(paid.status, RequestStatus::Paid);
        assert_eq!(market.stock("P1").await.quantity, 3);
        assert_eq!(market.stock("P2").await.quantity, 0);
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn only_pending_or_rejected_can_be_deleted() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;

        let pending = market
            .service
            .create(market.customer, market.new_request(&[("P1", 1, 1000)]))
            .await
            .unwrap();
        market
            .service
            .delete(market.customer, pending.id)
            .await
            .unwrap();
        assert!(matches!(
            market.service.get(market.customer, pending.id).await,
            Err(DomainError::NotFound { .. })
        ));

        let rejected = market
            .service
            .create(market.customer, market.new_request(&[("P1", 1, 1000)]))
            .await
            .unwrap();
        market
            .service
            .reject(market.farmer, rejected.id)
            .await
            .unwrap();
        market
            .service
            .delete(market.customer, rejected.id)
            .await
            .unwrap();

        let accepted = market.accepted_request(&[("P1", 1, 1000)]).await;
        let err = market
            .service
            .delete(market.customer, accepted.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                current: RequestStatus::Accepted,
                action: "delete"
            }
        ));

        market
            .service
            .pay(market.customer, accepted.id)
            .await
            .unwrap();
        let err = market
            .service
            .delete(market.customer, accepted.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                current: RequestStatus::Paid,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn deleting_unknown_request_is_not_found() {
        let market = Marketplace::new().await;
        let err = market
            .service
            .delete(market.customer, RequestId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}

mod authorization {
    use super::*;

    #[tokio::test]
    async fn wrong_party_is_rejected_without_changes() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;
        let stranger = UserId::new();

        let request = market
            .service
            .create(market.customer, market.new_request(&[("P1", 1, 1000)]))
            .await
            .unwrap();

        for result in [
            market.service.accept(market.customer, request.id).await,
            market.service.reject(stranger, request.id).await,
        ] {
            assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
        }
        assert!(matches!(
            market.service.delete(market.farmer, request.id).await,
            Err(DomainError::Unauthorized { .. })
        ));

        market
            .service
            .accept(market.farmer, request.id)
            .await
            .unwrap();
        assert!(matches!(
            market.service.pay(market.farmer, request.id).await,
            Err(DomainError::Unauthorized { action: "pay", .. })
        ));
        assert!(matches!(
            market.service.details(stranger, request.id).await,
            Err(DomainError::Unauthorized { .. })
        ));

        let unchanged = market
            .service
            .get(market.customer, request.id)
            .await
            .unwrap();
        assert_eq!(unchanged.status, RequestStatus::Accepted);
        assert_eq!(market.stock("P1").await.quantity, 10);
    }
}

mod retrieval {
    use super::*;

    #[tokio::test]
    async fn listings_are_newest_first() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;

        let mut created = Vec::new();
        for qty in 1..=3 {
            let request = market
                .service
                .create(market.customer, market.new_request(&[("P1", qty, 1000)]))
                .await
                .unwrap();
            created.push(request.id);
        }
        created.reverse();

        let for_customer: Vec<_> = market
            .service
            .list_for_customer(market.customer, Page::all())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let for_farmer: Vec<_> = market
            .service
            .list_for_farmer(market.farmer, Page::all())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(for_customer, created);
        assert_eq!(for_farmer, created);
        assert!(
            market
                .service
                .list_for_customer(market.farmer, Page::all())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn details_join_profiles_and_products() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;
        market.list("P2", 500, 10).await;
        let request = market
            .service
            .create(
                market.customer,
                market.new_request(&[("P1", 2, 1000), ("P2", 1, 500)]),
            )
            .await
            .unwrap();

        let details = market
            .service
            .details(market.farmer, request.id)
            .await
            .unwrap();

        assert_eq!(details.customer.as_ref().unwrap().display_name(), "Ada Eze");
        assert_eq!(details.farmer.as_ref().unwrap().email, "bayo@farm.ng");
        assert_eq!(details.lines.len(), 2);
        assert_eq!(details.lines[0].product_name(), "Product P1");
        assert_eq!(details.item_count(), 3);

        let listed = market
            .service
            .with_details(
                market
                    .service
                    .list_for_farmer(market.farmer, Page::all())
                    .await
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].request.id, request.id);
    }

    #[tokio::test]
    async fn receipt_only_for_paid() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;
        let request = market.accepted_request(&[("P1", 1, 1000)]).await;

        assert!(matches!(
            market.service.receipt(market.customer, request.id).await,
            Err(DomainError::ReceiptUnavailable {
                status: RequestStatus::Accepted,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn sales_summary_reflects_payments() {
        let market = Marketplace::new().await;
        market.list("P1", 1000, 10).await;
        let paid = market.accepted_request(&[("P1", 3, 1000)]).await;
        market
            .service
            .pay(market.customer, paid.id)
            .await
            .unwrap();
        market
            .service
            .create(market.customer, market.new_request(&[("P1", 1, 1000)]))
            .await
            .unwrap();

        let summary = market
            .service
            .sales_summary(market.farmer, market.farmer)
            .await
            .unwrap();

        assert_eq!(summary.total_requests, 2);
        assert_eq!(summary.paid, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.revenue.minor(), 3000);
        assert_eq!(summary.units_sold, 3);
        assert_eq!(summary.open_value.minor(), 1000);
    }
}
