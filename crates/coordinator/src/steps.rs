use serde::{Deserialize, Serialize};

/// The steps of placing an order, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CheckAvailability,
    ReserveItem,
    ReserveAgent,
    MintOrderId,
    BookItem,
    BookAgent,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Step; 6] = [
        Step::CheckAvailability,
        Step::ReserveItem,
        Step::ReserveAgent,
        Step::MintOrderId,
        Step::BookItem,
        Step::BookAgent,
    ];

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CheckAvailability => "check_availability",
            Step::ReserveItem => "reserve_item",
            Step::ReserveAgent => "reserve_agent",
            Step::MintOrderId => "mint_order_id",
            Step::BookItem => "book_item",
            Step::BookAgent => "book_agent",
        }
    }

    /// The booking step that consumes this step's reservation.
    pub fn booked_by(&self) -> Option<Step> {
        match self {
            Step::ReserveItem => Some(Step::BookItem),
            Step::ReserveAgent => Some(Step::BookAgent),
            _ => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
