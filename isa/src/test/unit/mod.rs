mod inst;
