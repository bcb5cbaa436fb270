pub mod builders;
pub mod mock_delegate;
