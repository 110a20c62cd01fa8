use std::fmt;

/// Status word returned by the controller in every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const ERROR_INTERNAL: Status = Status(3);
    pub const ERROR_NOT_FOUND: Status = Status(5);
    pub const ERROR_INVALID_PARAM: Status = Status(7);
    pub const ERROR_INVALID_STATE: Status = Status(8);
    pub const ERROR_TIMEOUT: Status = Status(13);
    pub const ERROR_BUSY: Status = Status(17);
    pub const BLE_ERROR_INVALID_CONN_HANDLE: Status = Status(0x3002);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Symbolic name, or `UNKNOWN`.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "NRF_SUCCESS",
            1 => "NRF_ERROR_SVC_HANDLER_MISSING",
            2 => "NRF_ERROR_SOFTDEVICE_NOT_ENABLED",
            3 => "NRF_ERROR_INTERNAL",
            4 => "NRF_ERROR_NO_MEM",
            5 => "NRF_ERROR_NOT_FOUND",
            6 => "NRF_ERROR_NOT_SUPPORTED",
            7 => "NRF_ERROR_INVALID_PARAM",
            8 => "NRF_ERROR_INVALID_STATE",
            9 => "NRF_ERROR_INVALID_LENGTH",
            10 => "NRF_ERROR_INVALID_FLAGS",
            11 => "NRF_ERROR_INVALID_DATA",
            12 => "NRF_ERROR_DATA_SIZE",
            13 => "NRF_ERROR_TIMEOUT",
            14 => "NRF_ERROR_NULL",
            15 => "NRF_ERROR_FORBIDDEN",
            16 => "NRF_ERROR_INVALID_ADDR",
            17 => "NRF_ERROR_BUSY",
            0x3001 => "BLE_ERROR_NOT_ENABLED",
            0x3002 => "BLE_ERROR_INVALID_CONN_HANDLE",
            0x3003 => "BLE_ERROR_INVALID_ATTR_HANDLE",
            0x3004 => "BLE_ERROR_NO_TX_PACKETS",
            0x3005 => "BLE_ERROR_INVALID_ROLE",
            0x3200 => "BLE_ERROR_GAP_UUID_LIST_MISMATCH",
            0x3201 => "BLE_ERROR_GAP_DISCOVERABLE_WITH_WHITELIST",
            0x3202 => "BLE_ERROR_GAP_INVALID_BLE_ADDR",
            0x3203 => "BLE_ERROR_GAP_WHITELIST_IN_USE",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x})", self.name(), self.0)
    }
}
