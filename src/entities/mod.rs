pub mod order;
pub mod order_item;
pub mod order_payment;
pub mod order_shipping;

// Re-export entities
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_payment::{Entity as OrderPayment, Model as OrderPaymentModel, PaymentState};
pub use order_shipping::{Entity as OrderShipping, Model as OrderShippingModel};
