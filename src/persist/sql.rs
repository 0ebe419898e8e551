// Enum-to-SQL string tables for the Postgres mirror.
//
// `Invalid` maps to `None`; the write-behind worker rejects such rows before
// they reach a statement.

use crate::model::{
    AccountType, Capacity, Currency, OrderStatus, OrderType, SettlType, Side, TimeInForce,
};

/// Fixed mapping of a domain enum onto its SQL enum label.
pub trait SqlEnum {
    fn as_sql(&self) -> Option<&'static str>;
}

impl SqlEnum for Side {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::BuyMinus => "BUY_MINUS",
            Side::SellPlus => "SELL_PLUS",
            Side::SellShort => "SELL_SHORT",
            Side::Cross => "CROSS",
            Side::Invalid => return None,
        })
    }
}

impl SqlEnum for OrderType {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopLimit => "STOPLIMIT",
            OrderType::Invalid => return None,
        })
    }
}

impl SqlEnum for OrderStatus {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            OrderStatus::ReceivedNew => "RECEIVED_NEW",
            OrderStatus::PendingNew => "PENDING_NEW",
            OrderStatus::New => "NEW",
            OrderStatus::PartFill => "PARTIAL_FILL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::DoneForDay => "DONE_FOR_DAY",
            OrderStatus::Suspended => "SUSPENDED",
            OrderStatus::Replaced => "REPLACED",
            OrderStatus::PendingReplace => "PENDING_REPLACE",
            OrderStatus::Invalid => return None,
        })
    }
}

impl SqlEnum for TimeInForce {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            TimeInForce::Day => "DAY",
            TimeInForce::Gtd => "GTD",
            TimeInForce::Gtc => "GTC",
            TimeInForce::Fok => "FOK",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Opg => "OPG",
            TimeInForce::AtClose => "ATCLOSE",
            TimeInForce::Invalid => return None,
        })
    }
}

impl SqlEnum for Capacity {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            Capacity::Agency => "AGENCY",
            Capacity::Principal => "PRINCIPAL",
            Capacity::Proprietary => "PROPRIETARY",
            Capacity::Individual => "INDIVIDUAL",
            Capacity::RisklessPrincipal => "RISKLESS_PRINCIPAL",
            Capacity::AgentForAnotherMember => "AGENT_FOR_ANOTHER_MEMBER",
            Capacity::Invalid => return None,
        })
    }
}

impl SqlEnum for Currency {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Invalid => return None,
        })
    }
}

impl SqlEnum for SettlType {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            SettlType::Regular => "REGULAR",
            SettlType::Cash => "CASH",
            SettlType::NextDay => "NEXT_DAY",
            SettlType::TPlus2 => "T_PLUS_2",
            SettlType::TPlus3 => "T_PLUS_3",
            SettlType::TPlus4 => "T_PLUS_4",
            SettlType::TPlus5 => "T_PLUS_5",
            SettlType::SellersOption => "SELLERS_OPTION",
            SettlType::WhenIssued => "WHEN_ISSUED",
            SettlType::TPlus1 => "T_PLUS_1",
            SettlType::BuyersOption => "BUYERS_OPTION",
            SettlType::SpecialTrade => "SPECIAL_TRADE",
            SettlType::Tenor => "TENOR",
            SettlType::Invalid => return None,
        })
    }
}

impl SqlEnum for AccountType {
    fn as_sql(&self) -> Option<&'static str> {
        Some(match self {
            AccountType::Principal => "PRINCIPAL",
            AccountType::Agency => "AGENCY",
            AccountType::Invalid => return None,
        })
    }
}
