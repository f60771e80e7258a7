use common::{Money, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Cart, CartItem, PurchaseRequestService};
use storage::{
    InMemoryProductStore, InMemoryProfileDirectory, InMemoryPurchaseRequestRepository, Product,
    ProductStore, ProductType,
};

fn bench_cart_operations(c: &mut Criterion) {
    let farmer = UserId::new();
    let items: Vec<CartItem> = (0..20)
        .map(|i| {
            CartItem::new(
                format!("SKU-{i}"),
                farmer,
                format!("Item {i}"),
                "Grains",
                Money::from_minor(1000 + i),
            )
        })
        .collect();

    c.bench_function("domain/cart_add_update_total", |b| {
        b.iter(|| {
            let mut cart = Cart::new();
            for item in &items {
                cart.add_item(item.clone(), 2).unwrap();
            }
            for item in items.iter().step_by(2) {
                cart.update_quantity(&item.id, 5).unwrap();
            }
            std::hint::black_box(cart.total_price());
            std::hint::black_box(cart.total_item_count());
        });
    });
}

fn bench_request_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let farmer = UserId::new();
    let customer = UserId::new();
    let products = InMemoryProductStore::new();
    let product = Product::new(
        "MAIZE",
        farmer,
        "Maize",
        "Grains",
        ProductType::Crop,
        Money::from_minor(2000),
        u32::MAX,
    );
    rt.block_on(async { products.insert(product.clone()).await.unwrap() });
    let service = PurchaseRequestService::new(
        InMemoryPurchaseRequestRepository::new(),
        products,
        InMemoryProfileDirectory::new(),
    );

    c.bench_function("domain/create_accept_pay", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut cart = Cart::new();
                cart.add_item(CartItem::from(&product), 1).unwrap();
                let request = service
                    .create(customer, cart.checkout(customer, None).unwrap())
                    .await
                    .unwrap();
                service.accept(farmer, request.id).await.unwrap();
                service.pay(customer, request.id).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_cart_operations, bench_request_lifecycle);
criterion_main!(benches);
