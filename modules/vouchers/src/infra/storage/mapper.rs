use sea_orm::ActiveValue::Set;

use crate::contract::model::{DiscountType, Voucher};
use crate::infra::storage::entity::{ActiveModel, DiscountKind, Model};

impl From<DiscountKind> for DiscountType {
    fn from(kind: DiscountKind) -> Self {
        match kind {
            DiscountKind::Percentage => Self::Percentage,
            DiscountKind::Fixed => Self::Fixed,
        }
    }
}

impl From<DiscountType> for DiscountKind {
    fn from(kind: DiscountType) -> Self {
        match kind {
            DiscountType::Percentage => Self::Percentage,
            DiscountType::Fixed => Self::Fixed,
        }
    }
}

pub fn entity_to_contract(entity: Model) -> Voucher {
    Voucher {
        id: entity.id,
        code: entity.code,
        discount_amount: entity.discount_amount,
        discount_type: entity.discount_type.into(),
        expiry_date: entity.expiry_date,
        is_active: entity.is_active,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
    }
}

/// Every column set; used for both insert and full-row update.
pub fn contract_to_active(v: Voucher) -> ActiveModel {
    ActiveModel {
        id: Set(v.id),
        code: Set(v.code),
        discount_amount: Set(v.discount_amount),
        discount_type: Set(v.discount_type.into()),
        expiry_date: Set(v.expiry_date),
        is_active: Set(v.is_active),
        created_at: Set(v.created_at),
        updated_at: Set(v.updated_at),
    }
}
