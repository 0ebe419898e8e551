// Order domain enumerations.
//
// Every enum carries an `Invalid` variant used as the default and as the
// decoder fallback for out-of-range wire values. SQL string mappings live in
// the persist module; `Invalid` never maps to a SQL string.

use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[repr(u32)]
        pub enum $name {
            #[default]
            Invalid = 0,
            $($variant = $value),+
        }

        impl $name {
            #[inline]
            pub const fn as_u32(self) -> u32 {
                self as u32
            }

            /// Maps a wire value back to the enum; unknown values decode as
            /// `Invalid` rather than failing the whole record.
            pub fn from_u32(value: u32) -> Self {
                match value {
                    $($value => Self::$variant,)+
                    _ => Self::Invalid,
                }
            }
        }
    };
}

wire_enum! {
    /// Side of an order.
    Side {
        Buy = 1,
        Sell = 2,
        BuyMinus = 3,
        SellPlus = 4,
        SellShort = 5,
        Cross = 6,
    }
}

impl Side {
    /// The side a contra order must have to trade against this one.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy | Side::BuyMinus => Side::Sell,
            Side::Sell | Side::SellPlus | Side::SellShort => Side::Buy,
            Side::Cross | Side::Invalid => Side::Invalid,
        }
    }

    /// Whether the side rests on the bid half of a book.
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy | Side::BuyMinus)
    }
}

wire_enum! {
    OrderType {
        Market = 1,
        Limit = 2,
        Stop = 3,
        StopLimit = 4,
    }
}

wire_enum! {
    /// Order lifecycle status.
    ///
    /// `ReceivedNew -> New -> PartFill -> Filled | Canceled | Rejected |
    /// Expired | Replaced`; `PendingNew` and `PendingReplace` are the
    /// intermediate gear-shift states.
    OrderStatus {
        ReceivedNew = 1,
        PendingNew = 2,
        New = 3,
        PartFill = 4,
        Filled = 5,
        Canceled = 6,
        Rejected = 7,
        Expired = 8,
        DoneForDay = 9,
        Suspended = 10,
        Replaced = 11,
        PendingReplace = 12,
    }
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::Replaced
        )
    }

    /// States in which the order may still trade or be amended.
    pub fn is_working(self) -> bool {
        matches!(
            self,
            OrderStatus::ReceivedNew
                | OrderStatus::PendingNew
                | OrderStatus::New
                | OrderStatus::PartFill
                | OrderStatus::PendingReplace
        )
    }

    /// Whether an operator-initiated change to `next` is legal from here.
    ///
    /// Operators may park, resume or close out a working order; they never
    /// resurrect a terminal one and never fabricate fill states.
    pub fn operator_change_allowed(self, next: OrderStatus) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        matches!(
            next,
            OrderStatus::New
                | OrderStatus::Suspended
                | OrderStatus::DoneForDay
                | OrderStatus::Canceled
                | OrderStatus::Expired
        )
    }
}

wire_enum! {
    TimeInForce {
        Day = 1,
        Gtd = 2,
        Gtc = 3,
        Fok = 4,
        Ioc = 5,
        Opg = 6,
        AtClose = 7,
    }
}

wire_enum! {
    Capacity {
        Agency = 1,
        Principal = 2,
        Proprietary = 3,
        Individual = 4,
        RisklessPrincipal = 5,
        AgentForAnotherMember = 6,
    }
}

wire_enum! {
    Currency {
        Usd = 1,
        Eur = 2,
    }
}

wire_enum! {
    SettlType {
        Regular = 1,
        Cash = 2,
        NextDay = 3,
        TPlus2 = 4,
        TPlus3 = 5,
        TPlus4 = 6,
        TPlus5 = 7,
        SellersOption = 8,
        WhenIssued = 9,
        TPlus1 = 10,
        BuyersOption = 11,
        SpecialTrade = 12,
        Tenor = 13,
    }
}

wire_enum! {
    AccountType {
        Principal = 1,
        Agency = 2,
    }
}

wire_enum! {
    RawDataType {
        String = 1,
        Message = 2,
        Xml = 3,
        Binary = 4,
    }
}

wire_enum! {
    /// Execution report flavor.
    ExecType {
        New = 1,
        Trade = 2,
        Cancel = 3,
        Replace = 4,
        Rejected = 5,
        Expired = 6,
        Status = 7,
    }
}
