//! Typed GAP and BLE calls on a [`Session`].
//!
//! Each method is a blocking [`Session::call`] of one operation from
//! `gaprpc_codec::gap` or `gaprpc_codec::ble`. Use [`Session::submit`] or
//! [`Session::request`] directly for the completion-handler and deferred
//! forms.

use gaprpc_codec::ble::{
    BleUuid, Enable, SystemReset, UuidDecode, UuidEncode, UuidVsAdd, Version, VersionGet,
};
use gaprpc_codec::gap::{
    AddressGet, AddressSet, AdvDataSet, AdvStart, AdvStop, AppearanceGet, AppearanceSet,
    AuthKeyReply, AuthKeyType, Authenticate, ConnParamUpdate, ConnSecGet, Connect,
    ConnectCancel, DeviceNameGet, DeviceNameSet, Disconnect, Encrypt, KeypressNotify,
    KeypressType, LescDhkeyReply, PpcpGet, PpcpSet, RssiGet, RssiStart, RssiStop, ScanStart,
    ScanStop, SecInfoReply, SecParamsReply, TxPowerSet,
};
use gaprpc_codec::{
    AdvParams, ConnParams, ConnSec, ConnSecMode, EncInfo, GapAddr, Key16, MasterId, ScanParams,
    SecKeyset, SecParams, SignKey,
};

use crate::error::Result;
use crate::session::Session;

/// `sec_status` accepting the pairing request.
pub const SEC_STATUS_SUCCESS: u8 = 0x00;

impl Session {
    /// Reset the controller. It sends no response.
    pub fn reset(&self) -> Result<()> {
        self.call(SystemReset)
    }

    pub fn enable(&self) -> Result<()> {
        self.call(Enable {})
    }

    pub fn get_version(&self) -> Result<Version> {
        self.call(VersionGet {})
    }

    /// Register a vendor-specific 128-bit base UUID; returns its uuid type.
    pub fn add_vendor_specific_uuid(&self, base: [u8; 16]) -> Result<u8> {
        self.call(UuidVsAdd { base })
    }

    pub fn encode_uuid(&self, uuid: BleUuid) -> Result<Vec<u8>> {
        self.call(UuidEncode { uuid })
    }

    pub fn decode_uuid(&self, uuid_le: Vec<u8>) -> Result<BleUuid> {
        self.call(UuidDecode { uuid_le })
    }

    pub fn set_address(&self, addr: GapAddr) -> Result<()> {
        self.call(AddressSet { addr })
    }

    pub fn get_address(&self) -> Result<GapAddr> {
        self.call(AddressGet {})
    }

    pub fn set_advertising_data(&self, data: Vec<u8>, scan_rsp: Vec<u8>) -> Result<()> {
        self.call(AdvDataSet { data, scan_rsp })
    }

    pub fn start_advertising(&self, params: AdvParams) -> Result<()> {
        self.call(AdvStart { params })
    }

    pub fn stop_advertising(&self) -> Result<()> {
        self.call(AdvStop {})
    }

    /// As central, update the link; as peripheral, request an update.
    /// `None` asks the controller to use its preferred parameters.
    pub fn update_connection_parameters(&self, conn_handle: u16, params: Option<ConnParams>) -> Result<()> {
        self.call(ConnParamUpdate { conn_handle, params })
    }

    pub fn disconnect(&self, conn_handle: u16, hci_status_code: u8) -> Result<()> {
        self.call(Disconnect {
            conn_handle,
            hci_status_code,
        })
    }

    pub fn set_tx_power(&self, tx_power: i8) -> Result<()> {
        self.call(TxPowerSet { tx_power })
    }

    pub fn set_device_name(&self, write_perm: ConnSecMode, name: impl Into<String>) -> Result<()> {
        self.call(DeviceNameSet {
            write_perm,
            name: name.into(),
        })
    }

    pub fn get_device_name(&self) -> Result<String> {
        self.call(DeviceNameGet {})
    }

    pub fn set_appearance(&self, appearance: u16) -> Result<()> {
        self.call(AppearanceSet { appearance })
    }

    pub fn get_appearance(&self) -> Result<u16> {
        self.call(AppearanceGet {})
    }

    /// Set the peripheral preferred connection parameters.
    pub fn set_ppcp(&self, params: ConnParams) -> Result<()> {
        self.call(PpcpSet { params })
    }

    pub fn get_ppcp(&self) -> Result<ConnParams> {
        self.call(PpcpGet {})
    }

    pub fn start_rssi(&self, conn_handle: u16, threshold_dbm: u8, skip_count: u8) -> Result<()> {
        self.call(RssiStart {
            conn_handle,
            threshold_dbm,
            skip_count,
        })
    }

    pub fn stop_rssi(&self, conn_handle: u16) -> Result<()> {
        self.call(RssiStop { conn_handle })
    }

    pub fn get_rssi(&self, conn_handle: u16) -> Result<i8> {
        self.call(RssiGet { conn_handle })
    }

    pub fn start_scan(&self, params: ScanParams) -> Result<()> {
        self.call(ScanStart { params })
    }

    pub fn stop_scan(&self) -> Result<()> {
        self.call(ScanStop {})
    }

    pub fn connect(&self, peer_addr: GapAddr, scan_params: ScanParams, conn_params: ConnParams) -> Result<()> {
        self.call(Connect {
            peer_addr,
            scan_params,
            conn_params,
        })
    }

    pub fn cancel_connect(&self) -> Result<()> {
        self.call(ConnectCancel {})
    }

    /// Start pairing or bonding. `None` rejects a peer's security request.
    pub fn authenticate(&self, conn_handle: u16, params: Option<SecParams>) -> Result<()> {
        self.call(Authenticate { conn_handle, params })
    }

    /// Answer a security parameters request.
    ///
    /// Creates the connection's security context first, so keys the peer
    /// distributes have somewhere to land. The context survives only if
    /// the call succeeds and `sec_status` accepts the pairing; otherwise
    /// it is released. Fails with `SecurityContextConflict` if a context
    /// for `conn_handle` is still live.
    pub fn reply_security_parameters(
        &self,
        conn_handle: u16,
        sec_status: u8,
        params: Option<SecParams>,
        keyset: Option<SecKeyset>,
    ) -> Result<SecKeyset> {
        let lease = self.security().lease(conn_handle, keyset)?;
        let returned = self.call(SecParamsReply {
            conn_handle,
            sec_status,
            params,
            keyset,
        })?;
        if sec_status == SEC_STATUS_SUCCESS {
            self.security().update(conn_handle, &returned)?;
            lease.commit();
        }
        Ok(returned)
    }

    pub fn reply_security_info(
        &self,
        conn_handle: u16,
        enc_info: Option<EncInfo>,
        id_irk: Option<Key16>,
        sign_info: Option<SignKey>,
    ) -> Result<()> {
        self.call(SecInfoReply {
            conn_handle,
            enc_info,
            id_irk,
            sign_info,
        })
    }

    pub fn get_connection_security(&self, conn_handle: u16) -> Result<ConnSec> {
        self.call(ConnSecGet { conn_handle })
    }

    pub fn encrypt(&self, conn_handle: u16, master_id: MasterId, enc_info: EncInfo) -> Result<()> {
        self.call(Encrypt {
            conn_handle,
            master_id,
            enc_info,
        })
    }

    /// Answer an auth key request: six ASCII digits for a passkey, 16
    /// bytes for OOB, nothing for `AuthKeyType::None`.
    pub fn reply_auth_key(&self, conn_handle: u16, key_type: AuthKeyType, key: Option<Vec<u8>>) -> Result<()> {
        self.call(AuthKeyReply {
            conn_handle,
            key_type,
            key,
        })
    }

    /// Compute `dhkey` with [`LescKeypair::dhkey`](crate::LescKeypair::dhkey).
    pub fn reply_lesc_dhkey(&self, conn_handle: u16, dhkey: Option<[u8; 32]>) -> Result<()> {
        self.call(LescDhkeyReply { conn_handle, dhkey })
    }

    pub fn notify_keypress(&self, conn_handle: u16, kp_not: KeypressType) -> Result<()> {
        self.call(KeypressNotify {
            conn_handle,
            kp_not,
        })
    }
}
