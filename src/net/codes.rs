//! Command and response codes of the wire protocol.

/// A client command, the first byte of every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    SetWriterDuration = 245,
    SetReaderDuration = 246,
    GetWriterDuration = 247,
    GetReaderDuration = 248,
    GetFileContent = 249,
    GetWriteResult = 250,
    ModifyFile = 251,
    RemoveFile = 252,
    AddFile = 253,
    HasFile = 254,
    Search = 255,
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            245 => Ok(Command::SetWriterDuration),
            246 => Ok(Command::SetReaderDuration),
            247 => Ok(Command::GetWriterDuration),
            248 => Ok(Command::GetReaderDuration),
            249 => Ok(Command::GetFileContent),
            250 => Ok(Command::GetWriteResult),
            251 => Ok(Command::ModifyFile),
            252 => Ok(Command::RemoveFile),
            253 => Ok(Command::AddFile),
            254 => Ok(Command::HasFile),
            255 => Ok(Command::Search),
            other => Err(other),
        }
    }
}

/// A response code, the first byte of every reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0,
    InvalidCommand = 1,
    ErrorReceivingCommand = 2,
    ErrorReceivingData = 3,
    ArgumentIsZero = 4,
    SearchEntriesNotFound = 5,
    FileNotFound = 6,
    CouldNotAddFile = 7,
    DurationTooSmall = 8,
    OperationNotProcessed = 9,
    OperationInProgress = 10,
    WriteTaskIdNotFound = 11,
}

impl TryFrom<u8> for ResponseCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            0 => Ok(ResponseCode::Ok),
            1 => Ok(ResponseCode::InvalidCommand),
            2 => Ok(ResponseCode::ErrorReceivingCommand),
            3 => Ok(ResponseCode::ErrorReceivingData),
            4 => Ok(ResponseCode::ArgumentIsZero),
            5 => Ok(ResponseCode::SearchEntriesNotFound),
            6 => Ok(ResponseCode::FileNotFound),
            7 => Ok(ResponseCode::CouldNotAddFile),
            8 => Ok(ResponseCode::DurationTooSmall),
            9 => Ok(ResponseCode::OperationNotProcessed),
            10 => Ok(ResponseCode::OperationInProgress),
            11 => Ok(ResponseCode::WriteTaskIdNotFound),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_byte_values() {
        assert_eq!(Command::SetWriterDuration as u8, 245);
        assert_eq!(Command::Search as u8, 255);
        assert_eq!(Command::try_from(253), Ok(Command::AddFile));
        assert_eq!(Command::try_from(100), Err(100));
    }

    #[test]
    fn test_response_code_roundtrip() {
        for byte in 0u8..=11 {
            let code = ResponseCode::try_from(byte).unwrap();
            assert_eq!(code as u8, byte);
        }
        assert_eq!(ResponseCode::try_from(12), Err(12));
    }
}
