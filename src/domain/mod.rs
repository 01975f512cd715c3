// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// The order aggregate owns the workflow state machines; the remaining modules
// are value objects and read models for the external collaborators the
// workflow touches (catalog, stores, couriers, payments, promotions).
//
// ============================================================================

pub mod audit;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod promotion;
