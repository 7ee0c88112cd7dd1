//! Bindings for the three contracts the validator interacts with.

use alloy::sol;

sol! {
    #[sol(rpc)]
    contract ForeignToken {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

sol! {
    #[sol(rpc)]
    contract HomeBridge {
        event Confirmation(
            bytes32 transferHash,
            bytes32 transactionHash,
            uint256 amount,
            address recipient,
            address indexed validator
        );
        event Completion(bytes32 transferHash);

        function confirmTransfer(
            bytes32 transferHash,
            bytes32 transactionHash,
            uint256 amount,
            address recipient
        ) external;

        function validatorProxy() external view returns (address);
    }
}

sol! {
    #[sol(rpc)]
    contract ValidatorProxy {
        function isValidator(address validator) external view returns (bool);
    }
}
