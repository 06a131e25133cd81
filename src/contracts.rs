//! Solidity bindings for the contracts this tool calls.

use alloy::sol;

sol! {
    /// StarkEx perpetual exchange contract (subset used for onboarding and funding).
    #[sol(rpc)]
    interface IStarkPerpetual {
        function registerUser(address ethKey, uint256 starkKey, bytes calldata signature) external;
        function deposit(uint256 starkKey, uint256 assetType, uint256 vaultId, uint256 quantizedAmount) external;
        function withdraw(uint256 ownerKey, uint256 assetType) external;
        function getWithdrawalBalance(uint256 ownerKey, uint256 assetId) external view returns (uint256 balance);
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

sol! {
    #[sol(rpc)]
    interface IWETH9 {
        function deposit() external payable;
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

sol! {
    /// Uniswap v3 QuoterV2. Quote functions are non-view; call them with `eth_call`.
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
    }
}

sol! {
    /// Uniswap v3 SwapRouter02.
    #[sol(rpc)]
    interface ISwapRouter02 {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}
