use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};

use crate::{
    dto::{
        cart::{AddCartItemRequest, CartLine, CartView, UpdateCartItemRequest},
        orders::{CheckoutOutcome, CheckoutRequest, OrderList, UpdateOrderStatusRequest},
        products::{
            CreateProductRequest, InventoryAdjustRequest, LowStockQuery, ProductList,
            UpdateProductRequest,
        },
    },
    models::{Cart, CartItem, Order, OrderItem, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::view_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory,
    ),
    components(
        schemas(
            Product,
            Cart,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            CartView,
            CartLine,
            AddCartItemRequest,
            UpdateCartItemRequest,
            CheckoutRequest,
            CheckoutOutcome,
            OrderList,
            UpdateOrderStatusRequest,
            CreateProductRequest,
            UpdateProductRequest,
            InventoryAdjustRequest,
            LowStockQuery,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutOutcome>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product catalog"),
        (name = "Cart", description = "Current user's cart"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Admin", description = "Order lifecycle and inventory (admin only)"),
    )
)]
pub struct ApiDoc;
