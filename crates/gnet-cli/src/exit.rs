use gnet_core::protocol::ProtocolError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;

/// Exit code for an error bubbling out of a command
pub fn code_for(err: &anyhow::Error) -> i32 {
    let Some(protocol) = err.chain().find_map(|e| e.downcast_ref::<ProtocolError>()) else {
        return FAILURE;
    };
    match protocol {
        ProtocolError::Timeout => TIMEOUT,
        ProtocolError::Io(_) => TRANSPORT_ERROR,
        ProtocolError::InvalidParameter(_) | ProtocolError::Unsupported(_) => USAGE,
        ProtocolError::MalformedFrame(_)
        | ProtocolError::ChecksumError { .. }
        | ProtocolError::Status(_)
        | ProtocolError::TooManySegments { .. }
        | ProtocolError::MalformedSegment(_)
        | ProtocolError::AssignmentFailed { .. }
        | ProtocolError::FrameTooLarge { .. }
        | ProtocolError::MalformedResponse(_) => DATA_INVALID,
        ProtocolError::NotConstructed => FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn maps_protocol_errors_through_context() {
        let err = Err::<(), _>(ProtocolError::Timeout)
            .context("polling")
            .unwrap_err();
        assert_eq!(code_for(&err), TIMEOUT);

        let err = anyhow::Error::new(ProtocolError::Status(0x05));
        assert_eq!(code_for(&err), DATA_INVALID);

        assert_eq!(code_for(&anyhow::anyhow!("plain")), FAILURE);
    }
}
