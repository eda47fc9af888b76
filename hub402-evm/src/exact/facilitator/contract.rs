//! Solidity interface definitions for on-chain interactions.

use alloy_sol_types::sol;

sol! {
    /// Minimal ERC-3009 interface.
    ///
    /// Only the functions actually used by the facilitator are declared, and
    /// only the split `(v, r, s)` signature overload of
    /// `transferWithAuthorization`.
    ///
    /// Reference: <https://eips.ethereum.org/EIPS/eip-3009>
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IEIP3009 {
        function name() external view returns (string);
        function version() external view returns (string);
        function authorizationState(address authorizer, bytes32 nonce) external view returns (bool);
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}
