//! Domain models for the storefront.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{Cart, CartItem, CartLine};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderLookup, OrderWithItems};
pub use product::{Category, CategoryWithCount, Product, ProductDetail, ProductImage};
pub use user::{NewUser, User};
